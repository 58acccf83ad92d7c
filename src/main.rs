//! history-dosis binary entrypoint.
//! Loads config, opens durable state, wires adapters and starts the two
//! periodic tasks. There is no other command surface.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use history_dosis::config::{self, AppConfig};
use history_dosis::ingest::providers::http_media::{HttpMediaFetcher, HttpMediaResolver};
use history_dosis::ingest::providers::reddit_feed::RedditFeedScraper;
use history_dosis::ingest::providers::USER_AGENT;
use history_dosis::ingest::IngestPipeline;
use history_dosis::publish::archive::FsArchiver;
use history_dosis::publish::dry_run::DryRunPublisher;
use history_dosis::publish::types::Publisher;
use history_dosis::publish::x::{XPublisher, CREDENTIAL_BEARER};
use history_dosis::publish::PublishPipeline;
use history_dosis::rotation::SourceRotation;
use history_dosis::{scheduler, PostStore, Service};

/// Compact logs by default, JSON when DOSIS_LOG_FORMAT=json.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("history_dosis=info,warn"));

    let json = std::env::var("DOSIS_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn build_service(cfg: &AppConfig) -> Result<Arc<Service>> {
    let store = Arc::new(PostStore::open(cfg.posts_path()).context("opening post store")?);
    let rotation =
        Arc::new(SourceRotation::open(cfg.rotation_path()).context("opening rotation state")?);

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(cfg.network_timeout)
        .build()
        .context("building http client")?;

    let ingest = IngestPipeline::new(
        Arc::new(RedditFeedScraper::new(cfg.feed_base_url.clone(), client.clone())),
        Arc::new(HttpMediaResolver::new(client.clone())),
        Arc::new(HttpMediaFetcher::new(client.clone())),
        store.clone(),
        rotation,
        cfg.network_timeout,
    );

    let publisher: Arc<dyn Publisher> = if cfg.dry_run {
        Arc::new(DryRunPublisher::new())
    } else {
        Arc::new(
            XPublisher::new(cfg.publish_api_base.clone(), client).with_timeout(cfg.network_timeout),
        )
    };
    let publish = PublishPipeline::new(publisher, Arc::new(FsArchiver), store.clone(), cfg.network_timeout)
        .with_render_limit(cfg.render_limit);

    Ok(Arc::new(Service::new(
        cfg.identities.clone(),
        ingest,
        publish,
        store,
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = config::load_default()?;
    let service = build_service(&cfg)?;

    for identity in service.identities() {
        if !cfg.dry_run && identity.credentials.get(CREDENTIAL_BEARER).is_none() {
            tracing::warn!(identity = %identity.id, "no {CREDENTIAL_BEARER}; publishing will fail");
        }
        tracing::info!(
            identity = %identity.id,
            sources = ?identity.sources,
            media_dir = %identity.media_dir.display(),
            archive_dir = %identity.archive_dir.display(),
            "identity loaded"
        );
    }
    tracing::info!(
        state_dir = %cfg.state_dir.display(),
        ingest_every_secs = cfg.ingest_interval.as_secs(),
        publish_every_secs = cfg.publish_interval.as_secs(),
        dry_run = cfg.dry_run,
        "history-dosis starting"
    );

    let (ingest, publish) = scheduler::spawn(service, cfg.ingest_interval, cfg.publish_interval);

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("waiting for ctrl-c")?;
            tracing::info!("shutdown requested");
        }
        res = ingest => tracing::error!(?res, "ingest task ended"),
        res = publish => tracing::error!(?res, "publish task ended"),
    }
    Ok(())
}
