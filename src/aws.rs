use anyhow::{Context, Result};
use aws_config::{
    environment::region::EnvironmentVariableRegionProvider, meta::region::RegionProviderChain,
};
use aws_sdk_ecs::{config::Builder, Client};
use aws_types::region::Region;

pub mod ecs;
pub mod imds;

/// Region from `explicit`, then `AWS_REGION`, then the instance metadata.
pub async fn resolve_region(explicit: Option<String>) -> Result<Region> {
    if let Some(region) = explicit {
        return Ok(Region::new(region));
    }

    let from_env = RegionProviderChain::first_try(EnvironmentVariableRegionProvider::new())
        .region()
        .await;
    match from_env {
        Some(region) => Ok(region),
        None => {
            let guess = imds::MetadataClient::new()?
                .region()
                .await
                .with_context(|| "AWS_REGION is not set. Attempted guess failed")?;
            Ok(Region::new(guess))
        }
    }
}

/// ECS client using credentials from the environment or the instance profile.
pub async fn ecs_client(region: Region) -> Client {
    let sdk_config = aws_config::from_env().region(region.clone()).load().await;
    let config = Builder::from(&sdk_config).region(region).build();
    Client::from_conf(config)
}
