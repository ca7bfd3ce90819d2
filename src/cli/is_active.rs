use anyhow::{bail, Result};
use clap::Args;
use ecs_instance_health::{config::Config, drain::DrainController};
use tracing::debug;

use super::TargetArgs;

#[derive(Args, Debug)]
pub struct IsActiveArgs {
    #[command(flatten)]
    target: TargetArgs,
}

impl IsActiveArgs {
    pub async fn main(self) -> Result<()> {
        let config = Config::load()?;
        let target = self.target.resolve(&config).await?;

        let controller = DrainController::new(&target.client, target.cache);
        let (active, status) = controller
            .is_active(&target.cluster, &target.instance_id)
            .await?;

        let msg = format!("instance {} is in state '{status}'", target.instance_id);
        if !active {
            bail!(msg);
        }
        debug!("{msg}");
        Ok(())
    }
}
