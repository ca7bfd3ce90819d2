//! Minimal EC2 instance metadata reader.

use anyhow::{bail, Context, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

const METADATA_PREFIX: &str = "http://169.254.169.254/latest";
const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";

pub struct MetadataClient {
    http: Client,
    base: String,
}

impl MetadataClient {
    pub fn new() -> Result<Self> {
        Self::with_base(METADATA_PREFIX)
    }

    pub fn with_base(base: impl Into<String>) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(2)).build()?;
        Ok(Self {
            http,
            base: base.into(),
        })
    }

    /// IMDSv2 session token; `None` falls back to plain IMDSv1 requests.
    async fn token(&self) -> Option<String> {
        let res = self
            .http
            .put(format!("{}/api/token", self.base))
            .header(TOKEN_TTL_HEADER, "60")
            .send()
            .await;
        match res {
            Ok(res) if res.status() == StatusCode::OK => res.text().await.ok(),
            Ok(res) => {
                debug!("metadata token request returned {}", res.status());
                None
            }
            Err(e) => {
                debug!("metadata token request failed: {e}");
                None
            }
        }
    }

    async fn get(&self, path: &str, what: &str) -> Result<String> {
        let mut req = self.http.get(format!("{}/meta-data/{path}", self.base));
        if let Some(token) = self.token().await {
            req = req.header(TOKEN_HEADER, token);
        }
        let res = req
            .send()
            .await
            .with_context(|| format!("metadata request for the {what} failed"))?;

        let status = res.status();
        if status != StatusCode::OK {
            bail!(
                "could not get the {what} from the meta-data service. Status code of the response: {}",
                status.as_u16()
            );
        }
        res.text()
            .await
            .with_context(|| format!("failed to read the metadata response for the {what}"))
    }

    pub async fn instance_id(&self) -> Result<String> {
        self.get("instance-id", "instance id").await
    }

    pub async fn region(&self) -> Result<String> {
        let zone = self
            .get("placement/availability-zone", "instance region")
            .await?;
        region_from_zone(&zone)
    }
}

/// `us-east-1a` -> `us-east-1`
fn region_from_zone(zone: &str) -> Result<String> {
    let mut chars = zone.trim_end().chars();
    chars
        .next_back()
        .with_context(|| "empty availability zone from the meta-data service")?;
    Ok(chars.as_str().to_string())
}
