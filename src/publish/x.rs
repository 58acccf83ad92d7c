// src/publish/x.rs
//! X (Twitter) API v2 publisher: media upload, alt-text metadata, post.
//! Authenticates with the identity's `bearer_token` credential.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::types::{MediaId, Publisher, Receipt};
use crate::config::Credentials;
use crate::error::{Error, Result};

pub const CREDENTIAL_BEARER: &str = "bearer_token";

#[derive(Clone)]
pub struct XPublisher {
    base_url: String,
    client: Client,
    timeout: Duration,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Serialize)]
struct AltTextBody<'a> {
    id: &'a str,
    metadata: AltTextMetadata<'a>,
}

#[derive(Serialize)]
struct AltTextMetadata<'a> {
    alt_text: AltText<'a>,
}

#[derive(Serialize)]
struct AltText<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct PostBody<'a> {
    text: &'a str,
    media: PostMedia<'a>,
}

#[derive(Serialize)]
struct PostMedia<'a> {
    media_ids: [&'a str; 1],
}

impl XPublisher {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn permalink(post_id: &str) -> String {
        format!("https://x.com/i/status/{post_id}")
    }

    fn authed(&self, creds: &Credentials, path: &str) -> Result<RequestBuilder> {
        let token = creds
            .get(CREDENTIAL_BEARER)
            .ok_or_else(|| Error::Publish(format!("missing {CREDENTIAL_BEARER} credential")))?;
        Ok(self
            .client
            .post(format!("{}{path}", self.base_url))
            .timeout(self.timeout)
            .bearer_auth(token))
    }

    async fn send<T: for<'de> Deserialize<'de>>(req: RequestBuilder, step: &str) -> Result<T> {
        let rsp = req
            .send()
            .await
            .map_err(|e| Error::Publish(format!("{step}: {e}")))?;
        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(Error::Publish(format!("{step}: HTTP {status} {body}")));
        }
        rsp.json::<T>()
            .await
            .map_err(|e| Error::Publish(format!("{step}: bad response: {e}")))
    }
}

#[async_trait]
impl Publisher for XPublisher {
    async fn upload_media(&self, creds: &Credentials, bytes: Vec<u8>) -> Result<MediaId> {
        let part = Part::bytes(bytes)
            .file_name("media.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| Error::Publish(format!("upload: {e}")))?;
        let form = Form::new()
            .text("media_category", "tweet_image")
            .part("media", part);
        let req = self.authed(creds, "/2/media/upload")?.multipart(form);
        let env: DataEnvelope<IdOnly> = Self::send(req, "upload").await?;
        Ok(MediaId(env.data.id))
    }

    async fn attach_alt_text(&self, creds: &Credentials, media: &MediaId, text: &str) -> Result<()> {
        let body = AltTextBody {
            id: media.0.as_str(),
            metadata: AltTextMetadata {
                alt_text: AltText { text },
            },
        };
        let rsp = self
            .authed(creds, "/2/media/metadata")?
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Publish(format!("alt text: {e}")))?;
        rsp.error_for_status()
            .map_err(|e| Error::Publish(format!("alt text: {e}")))?;
        Ok(())
    }

    async fn publish(&self, creds: &Credentials, text: &str, media: &MediaId) -> Result<Receipt> {
        let body = PostBody {
            text,
            media: PostMedia {
                media_ids: [media.0.as_str()],
            },
        };
        let req = self.authed(creds, "/2/tweets")?.json(&body);
        let env: DataEnvelope<IdOnly> = Self::send(req, "post").await?;
        Ok(Receipt {
            permalink: Self::permalink(&env.data.id),
            post_id: env.data.id,
        })
    }

    fn name(&self) -> &'static str {
        "x"
    }
}
