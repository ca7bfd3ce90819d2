//! Resolve an EC2 instance id to its cluster-scoped container instance id.
//!
//! Lookups go through [`EcsBackend`] and the answer is kept in a one-entry
//! file cache. The cache file holds nothing but the id, so a cache path must
//! only ever be used for a single (cluster, instance) pair;
//! [`IdentityCache::for_instance`] derives such a path.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::{
    fmt,
    fs::read_to_string,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{aws::ecs::EcsBackend, error::EcsError};

/// Container instance id, the last path segment of its ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInstanceId(String);

impl ContainerInstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_arn(arn: &str) -> Result<Self, EcsError> {
        lazy_static! {
            // Old style `container-instance/<id>` and new style
            // `container-instance/<cluster>/<id>`.
            static ref CONTAINER_INSTANCE_ARN: Regex =
                Regex::new(r"^arn:[^:]+:ecs:[^:]*:[^:]*:container-instance/(?:[^/]+/)?([^/]+)$")
                    .unwrap();
        }
        CONTAINER_INSTANCE_ARN
            .captures(arn)
            .and_then(|caps| caps.get(1))
            .map(|id| Self::new(id.as_str()))
            .ok_or_else(|| EcsError::MalformedArn {
                arn: arn.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file holding exactly one [`ContainerInstanceId`].
#[derive(Debug, Clone)]
pub struct IdentityCache {
    path: PathBuf,
}

impl IdentityCache {
    /// Use `path` verbatim. The caller keeps it specific to one instance.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache under `dir`, named after the cluster and the EC2 instance.
    ///
    /// Both parts are percent-escaped and joined with `@`, which never
    /// survives escaping, so distinct pairs get distinct files.
    pub fn for_instance(dir: &Path, cluster: &str, ec2_instance_id: &str) -> Self {
        let name = format!(
            "ecs-instance-health-{cluster}@{instance}.cache",
            cluster = escape_file_part(cluster),
            instance = escape_file_part(ec2_instance_id),
        );
        Self::new(dir.join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached id, or `None` if the file is missing, unreadable or empty.
    pub fn read(&self) -> Option<ContainerInstanceId> {
        match read_to_string(&self.path) {
            Ok(contents) if !contents.is_empty() => Some(ContainerInstanceId::new(contents)),
            Ok(_) => None,
            Err(e) => {
                debug!(path = %self.path.display(), "identity cache miss: {e}");
                None
            }
        }
    }

    /// Replace the cache contents with `id`.
    ///
    /// Written to a temp file next to the target and renamed into place, so
    /// the file is readable by its owner only.
    pub fn write(&self, id: &ContainerInstanceId) -> Result<(), EcsError> {
        let cache_write = |source| EcsError::CacheWrite {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir).map_err(cache_write)?;
        file.write_all(id.as_str().as_bytes()).map_err(cache_write)?;
        file.persist(&self.path).map_err(|e| cache_write(e.error))?;
        Ok(())
    }
}

fn escape_file_part(part: &str) -> String {
    lazy_static! {
        static ref UNSAFE_CHARS: Regex = Regex::new(r"[^A-Za-z0-9_.-]").unwrap();
    }
    UNSAFE_CHARS
        .replace_all(part, |caps: &Captures| {
            caps[0].bytes().map(|b| format!("%{b:02X}")).collect::<String>()
        })
        .into_owned()
}

/// A resolved id, plus the cache write failure if it could not be saved.
#[derive(Debug)]
pub struct Resolution {
    pub id: ContainerInstanceId,
    pub cache_warning: Option<EcsError>,
}

pub struct IdentityResolver<'a, B: ?Sized> {
    backend: &'a B,
    cache: IdentityCache,
}

impl<'a, B: EcsBackend + ?Sized> IdentityResolver<'a, B> {
    pub fn new(backend: &'a B, cache: IdentityCache) -> Self {
        Self { backend, cache }
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Cached id if there is one, else look it up and cache it.
    ///
    /// The cached value is trusted as is; it is not checked against
    /// `cluster` or `ec2_instance_id`.
    pub async fn resolve(
        &self,
        cluster: &str,
        ec2_instance_id: &str,
    ) -> Result<Resolution, EcsError> {
        if let Some(id) = self.cache.read() {
            debug!(%id, path = %self.cache.path().display(), "using cached container instance id");
            return Ok(Resolution {
                id,
                cache_warning: None,
            });
        }

        let id = self.lookup(cluster, ec2_instance_id).await?;
        let cache_warning = self.cache.write(&id).err();
        Ok(Resolution { id, cache_warning })
    }

    async fn lookup(
        &self,
        cluster: &str,
        ec2_instance_id: &str,
    ) -> Result<ContainerInstanceId, EcsError> {
        let arns = self
            .backend
            .list_container_instance_arns(cluster, ec2_instance_id)
            .await?;
        let arn = arns.first().ok_or_else(|| EcsError::NotFound {
            cluster: cluster.to_string(),
            instance: ec2_instance_id.to_string(),
        })?;
        ContainerInstanceId::from_arn(arn)
    }
}
