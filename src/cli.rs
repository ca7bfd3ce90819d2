mod drain;
mod is_active;

pub use drain::DrainArgs;
pub use is_active::IsActiveArgs;

use anyhow::{Context, Result};
use clap::Args;
use ecs_instance_health::{
    aws::{ecs_client, imds::MetadataClient, resolve_region},
    config::Config,
    identity::IdentityCache,
};
use std::path::PathBuf;

/// Which instance in which cluster to operate on.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Name of the ECS cluster
    #[arg(long, short = 'c')]
    cluster: String,

    /// EC2 instance id (`-` reads it from the instance metadata)
    #[arg(long = "instance-id", short = 'i', allow_hyphen_values = true)]
    instance_id: String,

    /// Cache file for the container instance id (default: one file per
    /// cluster and instance under the configured cache directory)
    #[arg(long)]
    cache_path: Option<PathBuf>,

    /// AWS region (default: `AWS_REGION`, then the instance metadata)
    #[arg(long, short = 'r')]
    region: Option<String>,
}

/// A fully resolved [`TargetArgs`].
pub struct Target {
    pub cluster: String,
    pub instance_id: String,
    pub cache: IdentityCache,
    pub client: aws_sdk_ecs::Client,
}

impl TargetArgs {
    pub async fn resolve(self, config: &Config) -> Result<Target> {
        let instance_id = if self.instance_id == "-" {
            MetadataClient::new()?
                .instance_id()
                .await
                .with_context(|| "could not determine instance id")?
        } else {
            self.instance_id
        };

        let cache = match self.cache_path {
            Some(path) => IdentityCache::new(path),
            None => IdentityCache::for_instance(&config.cache_dir, &self.cluster, &instance_id),
        };

        let region = resolve_region(self.region).await?;
        let client = ecs_client(region).await;

        Ok(Target {
            cluster: self.cluster,
            instance_id,
            cache,
            client,
        })
    }
}
