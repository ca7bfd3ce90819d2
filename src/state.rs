use std::fmt;

use crate::{
    aws::ecs::{ContainerInstanceInfo, EcsBackend},
    error::EcsError,
    identity::ContainerInstanceId,
};

/// Lifecycle status string as reported by ECS, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceStatus(String);

impl InstanceStatus {
    pub const ACTIVE: &'static str = "ACTIVE";
    pub const DRAINING: &'static str = "DRAINING";

    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_active(&self) -> bool {
        self.0 == Self::ACTIVE
    }

    pub fn is_draining(&self) -> bool {
        self.0 == Self::DRAINING
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

async fn describe<B: EcsBackend + ?Sized>(
    backend: &B,
    cluster: &str,
    id: &ContainerInstanceId,
) -> Result<ContainerInstanceInfo, EcsError> {
    backend
        .describe_container_instance(cluster, id.as_str())
        .await?
        .ok_or_else(|| EcsError::NotFound {
            cluster: cluster.to_string(),
            instance: id.to_string(),
        })
}

pub async fn current_state<B: EcsBackend + ?Sized>(
    backend: &B,
    cluster: &str,
    id: &ContainerInstanceId,
) -> Result<InstanceStatus, EcsError> {
    Ok(InstanceStatus::new(describe(backend, cluster, id).await?.status))
}

pub async fn running_tasks<B: EcsBackend + ?Sized>(
    backend: &B,
    cluster: &str,
    id: &ContainerInstanceId,
) -> Result<u32, EcsError> {
    Ok(describe(backend, cluster, id).await?.running_tasks)
}
