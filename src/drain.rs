//! Put a container instance into DRAINING and wait for its tasks to leave.

use std::{future::pending, pin::Pin, time::Duration};

use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

use crate::{
    aws::ecs::EcsBackend,
    error::EcsError,
    identity::{ContainerInstanceId, IdentityCache, IdentityResolver},
    state::{current_state, running_tasks, InstanceStatus},
};

#[derive(Debug, Clone)]
pub struct DrainRequest {
    pub cluster: String,
    pub ec2_instance_id: String,
    /// Block until no tasks are left on the instance.
    pub wait: bool,
    pub poll_interval: Duration,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
}

pub struct DrainController<'a, B: ?Sized> {
    backend: &'a B,
    resolver: IdentityResolver<'a, B>,
}

impl<'a, B: EcsBackend + ?Sized> DrainController<'a, B> {
    pub fn new(backend: &'a B, cache: IdentityCache) -> Self {
        Self {
            backend,
            resolver: IdentityResolver::new(backend, cache),
        }
    }

    async fn container_instance(
        &self,
        cluster: &str,
        ec2_instance_id: &str,
    ) -> Result<ContainerInstanceId, EcsError> {
        let resolution = self.resolver.resolve(cluster, ec2_instance_id).await?;
        if let Some(warning) = resolution.cache_warning {
            warn!("{warning}");
        }
        Ok(resolution.id)
    }

    pub async fn is_active(
        &self,
        cluster: &str,
        ec2_instance_id: &str,
    ) -> Result<(bool, InstanceStatus), EcsError> {
        let id = self.container_instance(cluster, ec2_instance_id).await?;
        let status = current_state(self.backend, cluster, &id).await?;
        Ok((status.is_active(), status))
    }

    pub async fn drain(&self, req: &DrainRequest) -> Result<(), EcsError> {
        if req.wait && req.poll_interval.is_zero() {
            return Err(EcsError::InvalidPollInterval);
        }

        let id = self
            .container_instance(&req.cluster, &req.ec2_instance_id)
            .await?;

        let status = current_state(self.backend, &req.cluster, &id).await?;
        if status.is_draining() {
            debug!(container_instance = %id, "already draining");
        } else {
            self.backend.set_draining(&req.cluster, id.as_str()).await?;
        }
        info!("Instance {} has been set to DRAINING", req.ec2_instance_id);

        if !req.wait {
            return Ok(());
        }
        wait_for_tasks(
            self.backend,
            &req.cluster,
            &req.ec2_instance_id,
            &id,
            req.poll_interval,
            req.timeout,
        )
        .await
    }
}

/// Deadline for the wait loop. `Disabled` never fires.
enum TimeoutTimer {
    Disabled,
    Armed(Pin<Box<Sleep>>),
}

impl TimeoutTimer {
    fn new(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(after) => TimeoutTimer::Armed(Box::pin(sleep(after))),
            None => TimeoutTimer::Disabled,
        }
    }

    async fn expired(&mut self) {
        match self {
            TimeoutTimer::Armed(deadline) => deadline.as_mut().await,
            TimeoutTimer::Disabled => pending().await,
        }
    }
}

async fn check_tasks<B: EcsBackend + ?Sized>(
    backend: &B,
    cluster: &str,
    ec2_instance_id: &str,
    id: &ContainerInstanceId,
) -> Result<u32, EcsError> {
    let tasks = running_tasks(backend, cluster, id).await?;
    if tasks == 0 {
        info!("Instance {ec2_instance_id} has 0 tasks running");
    } else {
        info!("Instance {ec2_instance_id} still has {tasks} tasks running");
    }
    Ok(tasks)
}

/// Poll the running task count until it reaches zero or `timeout` passes.
///
/// The count is checked once before any timer is created. Both timers live
/// in this frame and are dropped on every return.
pub async fn wait_for_tasks<B: EcsBackend + ?Sized>(
    backend: &B,
    cluster: &str,
    ec2_instance_id: &str,
    id: &ContainerInstanceId,
    poll_interval: Duration,
    timeout: Option<Duration>,
) -> Result<(), EcsError> {
    if poll_interval.is_zero() {
        return Err(EcsError::InvalidPollInterval);
    }

    let mut remaining = check_tasks(backend, cluster, ec2_instance_id, id).await?;
    if remaining == 0 {
        return Ok(());
    }

    let started = Instant::now();
    let first_tick = started
        .checked_add(poll_interval)
        .ok_or(EcsError::InvalidPollInterval)?;
    let mut poll = interval_at(first_tick, poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut deadline = TimeoutTimer::new(timeout);

    loop {
        tokio::select! {
            // On a tie the timeout wins.
            biased;
            _ = deadline.expired() => {
                return Err(EcsError::Timeout {
                    waited: started.elapsed(),
                    remaining,
                });
            }
            _ = poll.tick() => {
                remaining = check_tasks(backend, cluster, ec2_instance_id, id).await?;
                if remaining == 0 {
                    return Ok(());
                }
            }
        }
    }
}
