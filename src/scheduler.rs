// src/scheduler.rs
//! Periodic trigger: one ingestion task and one publishing task, each running
//! every configured identity per tick.
//!
//! Identities run concurrently within a tick. Work for a single identity is
//! serialized across ticks and across both task kinds by its identity lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::config::Identity;
use crate::ingest::IngestPipeline;
use crate::publish::{PublishOutcome, PublishPipeline};
use crate::store::PostStore;

/// One async mutex per identity id.
#[derive(Debug, Default)]
pub struct IdentityLocks {
    locks: HashMap<String, Arc<Mutex<()>>>,
}

impl IdentityLocks {
    pub fn new<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            locks: ids
                .into_iter()
                .map(|id| (id.to_string(), Arc::new(Mutex::new(()))))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Mutex<()>>> {
        self.locks.get(id).cloned()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub ok: usize,
    pub failed: usize,
}

/// Everything the two periodic tasks share.
pub struct Service {
    identities: Vec<Arc<Identity>>,
    ingest: Arc<IngestPipeline>,
    publish: Arc<PublishPipeline>,
    store: Arc<PostStore>,
    locks: Arc<IdentityLocks>,
}

impl Service {
    pub fn new(
        identities: Vec<Identity>,
        ingest: IngestPipeline,
        publish: PublishPipeline,
        store: Arc<PostStore>,
    ) -> Self {
        let locks = IdentityLocks::new(identities.iter().map(|i| i.id.as_str()));
        Self {
            identities: identities.into_iter().map(Arc::new).collect(),
            ingest: Arc::new(ingest),
            publish: Arc::new(publish),
            store,
            locks: Arc::new(locks),
        }
    }

    pub fn identities(&self) -> &[Arc<Identity>] {
        &self.identities
    }

    pub fn locks(&self) -> &IdentityLocks {
        &self.locks
    }

    /// Ingest once for every identity.
    pub async fn ingest_tick(&self) -> TickSummary {
        let mut set = JoinSet::new();
        for identity in &self.identities {
            let identity = identity.clone();
            let pipeline = self.ingest.clone();
            let lock = self.locks.get(&identity.id);
            set.spawn(async move {
                let _guard = match &lock {
                    Some(l) => Some(l.lock().await),
                    None => None,
                };
                let res = pipeline.run_once(&identity).await;
                if let Err(e) = &res {
                    tracing::warn!(target: "scheduler", identity = %identity.id, error = %e, "ingest tick failed");
                }
                res.is_ok()
            });
        }
        let summary = collect(set, "ingest").await;
        self.log_counts();
        summary
    }

    /// Publish at most one post for every identity.
    pub async fn publish_tick(&self) -> TickSummary {
        let mut set = JoinSet::new();
        for identity in &self.identities {
            let identity = identity.clone();
            let pipeline = self.publish.clone();
            let lock = self.locks.get(&identity.id);
            set.spawn(async move {
                let _guard = match &lock {
                    Some(l) => Some(l.lock().await),
                    None => None,
                };
                match pipeline.run_once(&identity).await {
                    Ok(PublishOutcome::Published { .. }) | Ok(PublishOutcome::NothingQueued) => {
                        true
                    }
                    Err(e) => {
                        tracing::warn!(target: "scheduler", identity = %identity.id, error = %e, "publish tick failed");
                        false
                    }
                }
            });
        }
        collect(set, "publish").await
    }

    fn log_counts(&self) {
        for identity in &self.identities {
            match self.store.counts(&identity.id) {
                Ok(c) => tracing::info!(
                    target: "scheduler",
                    identity = %identity.id,
                    queued = c.queued,
                    published = c.published,
                    discarded = c.discarded,
                    "store state"
                ),
                Err(e) => tracing::warn!(target: "scheduler", identity = %identity.id, error = %e, "store counts failed"),
            }
        }
    }
}

async fn collect(mut set: JoinSet<bool>, kind: &str) -> TickSummary {
    let mut summary = TickSummary::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(true) => summary.ok += 1,
            Ok(false) => summary.failed += 1,
            Err(e) => {
                summary.failed += 1;
                tracing::error!(target: "scheduler", kind, error = %e, "identity task panicked");
            }
        }
    }
    summary
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut t = tokio::time::interval(period);
    t.set_missed_tick_behavior(MissedTickBehavior::Delay);
    t
}

/// Spawn both periodic tasks. The first tick of each fires immediately.
pub fn spawn(
    service: Arc<Service>,
    ingest_every: Duration,
    publish_every: Duration,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let ingest_svc = service.clone();
    let ingest = tokio::spawn(async move {
        let mut t = ticker(ingest_every);
        loop {
            t.tick().await;
            let s = ingest_svc.ingest_tick().await;
            tracing::info!(target: "scheduler", ok = s.ok, failed = s.failed, "ingest tick done");
        }
    });

    let publish = tokio::spawn(async move {
        let mut t = ticker(publish_every);
        loop {
            t.tick().await;
            let s = service.publish_tick().await;
            tracing::info!(target: "scheduler", ok = s.ok, failed = s.failed, "publish tick done");
        }
    });

    (ingest, publish)
}
