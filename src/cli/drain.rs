use anyhow::Result;
use clap::Args;
use ecs_instance_health::{
    config::Config,
    drain::{DrainController, DrainRequest},
};
use std::time::Duration;
use tracing::warn;

use super::TargetArgs;

#[derive(Args, Debug)]
pub struct DrainArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Wait until no tasks are running on the instance
    #[arg(long, short = 'w')]
    wait: bool,

    /// Maximum wait in seconds for draining to complete, 0 waits forever
    /// (default: from configuration, 600)
    #[arg(long)]
    wait_timeout: Option<u64>,

    /// Seconds between checks for running tasks (default: from
    /// configuration, 10)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    check_interval: Option<u64>,
}

impl DrainArgs {
    pub async fn main(self) -> Result<()> {
        let config = Config::load()?;
        let wait_timeout = self.wait_timeout.unwrap_or(config.wait_timeout);
        let check_interval = self.check_interval.unwrap_or(config.check_interval);
        let target = self.target.resolve(&config).await?;

        let request = DrainRequest {
            cluster: target.cluster,
            ec2_instance_id: target.instance_id,
            wait: self.wait,
            poll_interval: Duration::from_secs(check_interval),
            timeout: (wait_timeout > 0).then(|| Duration::from_secs(wait_timeout)),
        };

        let controller = DrainController::new(&target.client, target.cache);
        match controller.drain(&request).await {
            Err(e) if e.is_timeout() => {
                warn!("{e}");
                Ok(())
            }
            res => Ok(res?),
        }
    }
}
