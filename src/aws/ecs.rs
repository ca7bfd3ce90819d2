use async_trait::async_trait;
use aws_sdk_ecs as ecs;
use ecs::{types::ContainerInstanceStatus, Client};

use crate::error::EcsError;

/// Status and load of one container instance as reported by ECS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInstanceInfo {
    pub status: String,
    pub running_tasks: u32,
}

/// The ECS calls this crate consumes. Implementations must not retry.
#[async_trait]
pub trait EcsBackend: Send + Sync {
    /// Container instance ARNs in `cluster` registered for the EC2 instance.
    async fn list_container_instance_arns(
        &self,
        cluster: &str,
        ec2_instance_id: &str,
    ) -> Result<Vec<String>, EcsError>;

    /// Describe exactly one container instance; `None` when ECS returns nothing.
    async fn describe_container_instance(
        &self,
        cluster: &str,
        container_instance: &str,
    ) -> Result<Option<ContainerInstanceInfo>, EcsError>;

    async fn set_draining(&self, cluster: &str, container_instance: &str)
        -> Result<(), EcsError>;
}

fn instance_filter(ec2_instance_id: &str) -> String {
    format!("attribute:EC2_INSTANCE_ID=={ec2_instance_id}")
}

fn task_count(container_instance: &str, count: i32) -> Result<u32, EcsError> {
    u32::try_from(count).map_err(|_| EcsError::InvalidResponse {
        operation: "DescribeContainerInstances",
        detail: format!("negative running task count {count} for {container_instance}"),
    })
}

#[async_trait]
impl EcsBackend for Client {
    async fn list_container_instance_arns(
        &self,
        cluster: &str,
        ec2_instance_id: &str,
    ) -> Result<Vec<String>, EcsError> {
        let res = self
            .list_container_instances()
            .cluster(cluster)
            .filter(instance_filter(ec2_instance_id))
            .send()
            .await
            .map_err(|e| EcsError::transport("ListContainerInstances", e))?;
        Ok(res
            .container_instance_arns()
            .map(|arns| arns.to_vec())
            .unwrap_or_default())
    }

    async fn describe_container_instance(
        &self,
        cluster: &str,
        container_instance: &str,
    ) -> Result<Option<ContainerInstanceInfo>, EcsError> {
        let res = self
            .describe_container_instances()
            .cluster(cluster)
            .container_instances(container_instance)
            .send()
            .await
            .map_err(|e| EcsError::transport("DescribeContainerInstances", e))?;

        res.container_instances()
            .and_then(|instances| instances.first())
            .map(|ci| {
                Ok::<_, EcsError>(ContainerInstanceInfo {
                    status: ci.status().unwrap_or_default().to_string(),
                    running_tasks: task_count(container_instance, ci.running_tasks_count())?,
                })
            })
            .transpose()
    }

    async fn set_draining(
        &self,
        cluster: &str,
        container_instance: &str,
    ) -> Result<(), EcsError> {
        let res = self
            .update_container_instances_state()
            .cluster(cluster)
            .container_instances(container_instance)
            .status(ContainerInstanceStatus::Draining)
            .send()
            .await
            .map_err(|e| EcsError::transport("UpdateContainerInstancesState", e))?;

        if let Some(failure) = res.failures().and_then(|f| f.first()) {
            let reason = match (failure.reason(), failure.detail()) {
                (Some(reason), Some(detail)) => format!("{reason}: {detail}"),
                (Some(reason), None) => reason.to_string(),
                _ => "unknown failure".to_string(),
            };
            return Err(EcsError::UpdateRejected {
                instance: container_instance.to_string(),
                reason,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use super::*;

    /// In-memory backend with call counters.
    ///
    /// Task counts are handed out in order; the last one repeats forever.
    pub struct MockEcs {
        arns: Vec<String>,
        status: Mutex<String>,
        task_counts: Mutex<VecDeque<u32>>,
        fail_describe_after: Option<usize>,
        pub lists: AtomicUsize,
        pub describes: AtomicUsize,
        pub updates: AtomicUsize,
    }

    impl MockEcs {
        pub fn new(status: &str) -> Self {
            Self {
                arns: vec![
                    "arn:aws:ecs:eu-west-1:123456789012:container-instance/prod/4f1d6a2b9c8e"
                        .to_string(),
                ],
                status: Mutex::new(status.to_string()),
                task_counts: Mutex::new(VecDeque::from([0])),
                fail_describe_after: None,
                lists: AtomicUsize::new(0),
                describes: AtomicUsize::new(0),
                updates: AtomicUsize::new(0),
            }
        }

        pub fn with_arns(mut self, arns: Vec<String>) -> Self {
            self.arns = arns;
            self
        }

        pub fn with_task_counts(self, counts: impl IntoIterator<Item = u32>) -> Self {
            *self.task_counts.lock().unwrap() = counts.into_iter().collect();
            self
        }

        /// Every describe call after the first `n` fails.
        pub fn failing_describe_after(mut self, n: usize) -> Self {
            self.fail_describe_after = Some(n);
            self
        }

        pub fn status(&self) -> String {
            self.status.lock().unwrap().clone()
        }

        pub fn count(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EcsBackend for MockEcs {
        async fn list_container_instance_arns(
            &self,
            _cluster: &str,
            _ec2_instance_id: &str,
        ) -> Result<Vec<String>, EcsError> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            Ok(self.arns.clone())
        }

        async fn describe_container_instance(
            &self,
            _cluster: &str,
            _container_instance: &str,
        ) -> Result<Option<ContainerInstanceInfo>, EcsError> {
            let n = self.describes.fetch_add(1, Ordering::SeqCst);
            if matches!(self.fail_describe_after, Some(limit) if n >= limit) {
                let err = std::io::Error::new(std::io::ErrorKind::Other, "throttled");
                return Err(EcsError::transport("DescribeContainerInstances", err));
            }
            if self.arns.is_empty() {
                return Ok(None);
            }

            let mut counts = self.task_counts.lock().unwrap();
            let running_tasks = if counts.len() > 1 {
                counts.pop_front().unwrap()
            } else {
                counts.front().copied().unwrap_or(0)
            };
            Ok(Some(ContainerInstanceInfo {
                status: self.status(),
                running_tasks,
            }))
        }

        async fn set_draining(
            &self,
            _cluster: &str,
            _container_instance: &str,
        ) -> Result<(), EcsError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            *self.status.lock().unwrap() = "DRAINING".to_string();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_filter() {
        assert_eq!(
            instance_filter("i-0123456789abcdef0"),
            "attribute:EC2_INSTANCE_ID==i-0123456789abcdef0"
        );
    }

    #[test]
    fn test_negative_task_count_is_an_error() {
        assert_eq!(task_count("4f1d6a2b9c8e", 3).unwrap(), 3);
        assert_eq!(task_count("4f1d6a2b9c8e", 0).unwrap(), 0);

        let err = task_count("4f1d6a2b9c8e", -1).unwrap_err();
        assert!(matches!(
            err,
            EcsError::InvalidResponse {
                operation: "DescribeContainerInstances",
                ..
            }
        ));
    }
}
