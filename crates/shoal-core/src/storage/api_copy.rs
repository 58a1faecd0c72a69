use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;

use crate::cleanup::CleanupManager;
use crate::execution::{CommandSpec, ProcessExecutor, ProcessSpawnRequest, run_and_collect_stdout};
use crate::models::{CoreError, CoreErrorKind, CoreResult, StorageSourceType, StorageSpec};
use crate::storage::{StorageFuture, StorageProvider};

const IPFS_COMMAND: &str = "ipfs";
const FETCH_TIMEOUT: Duration = Duration::from_secs(600);

static NEXT_CACHE_ID: AtomicU64 = AtomicU64::new(0);

/// Copies content out of an IPFS node through its HTTP API into a local cache
/// directory owned by this provider.
pub struct ApiCopyStorageProvider {
    ipfs_api: String,
    cache_dir: PathBuf,
    process: Arc<dyn ProcessExecutor>,
    fetch_lock: Mutex<()>,
}

impl ApiCopyStorageProvider {
    pub fn new(
        cleanup: &CleanupManager,
        ipfs_api: &str,
        process: Arc<dyn ProcessExecutor>,
        cache_root: &Path,
    ) -> CoreResult<Self> {
        validate_multiaddr(ipfs_api)?;

        let cache_dir = cache_root.join(format!(
            "shoal-ipfs-{}-{}",
            std::process::id(),
            NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&cache_dir).map_err(|error| {
            configuration_error(format!(
                "failed to create storage cache '{}': {error}",
                cache_dir.display()
            ))
        })?;

        let owned_dir = cache_dir.clone();
        cleanup.register_sync(
            format!("ipfs-api-copy cache {}", cache_dir.display()),
            move || match std::fs::remove_dir_all(&owned_dir) {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(error) => Err(storage_error(format!(
                    "failed to remove storage cache '{}': {error}",
                    owned_dir.display()
                ))),
            },
        )?;

        tracing::debug!(cache_dir = %cache_dir.display(), "ipfs api copy provider created");

        Ok(Self {
            ipfs_api: ipfs_api.to_string(),
            cache_dir,
            process,
            fetch_lock: Mutex::new(()),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    async fn fetch(&self, spec: &StorageSpec) -> CoreResult<PathBuf> {
        validate_cid(spec)?;
        let target = self.cache_dir.join(&spec.cid);

        let _guard = self.fetch_lock.lock().await;
        if target.exists() {
            tracing::debug!(cid = %spec.cid, "storage cache hit");
            return Ok(target);
        }

        // Only a completed fetch is ever visible under the cid's own name.
        let partial = self.cache_dir.join(format!(".{}.partial", spec.cid));
        remove_partial(&partial)?;

        let request = ipfs_get_request(&self.ipfs_api, &spec.cid, &partial);
        if let Err(error) = run_and_collect_stdout(
            self.process.as_ref(),
            request,
            CoreErrorKind::StorageFailure,
        )
        .await
        {
            if let Err(cleanup_error) = remove_partial(&partial) {
                tracing::warn!(cid = %spec.cid, error = %cleanup_error, "failed to discard partial fetch");
            }
            return Err(error);
        }

        std::fs::rename(&partial, &target).map_err(|error| {
            storage_error(format!(
                "failed to move fetched content into '{}': {error}",
                target.display()
            ))
        })?;

        tracing::info!(cid = %spec.cid, path = %target.display(), "copied content from ipfs");
        Ok(target)
    }
}

fn remove_partial(path: &Path) -> CoreResult<()> {
    let removed = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match removed {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(storage_error(format!(
            "failed to remove partial fetch '{}': {error}",
            path.display()
        ))),
    }
}

impl StorageProvider for ApiCopyStorageProvider {
    fn source_type(&self) -> StorageSourceType {
        StorageSourceType::IpfsApiCopy
    }

    fn resolve<'a>(&'a self, spec: &'a StorageSpec) -> StorageFuture<'a, PathBuf> {
        Box::pin(self.fetch(spec))
    }
}

pub fn ipfs_get_request(ipfs_api: &str, cid: &str, target: &Path) -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(
        CommandSpec::new(IPFS_COMMAND)
            .args(["--api", ipfs_api, "get", cid, "--output"])
            .arg(target.to_string_lossy()),
    )
    .storage(StorageSourceType::IpfsApiCopy)
    .timeout(FETCH_TIMEOUT)
}

/// Accepts `/ip4|ip6|dns|dns4|dns6/<host>/tcp/<port>[/...]`.
pub fn validate_multiaddr(address: &str) -> CoreResult<()> {
    let mut parts = address.split('/');
    if parts.next() != Some("") {
        return Err(bad_address(address, "must start with '/'"));
    }

    let protocol = parts.next().unwrap_or_default();
    let host = parts.next().unwrap_or_default();
    let host_ok = match protocol {
        "ip4" => host.parse::<Ipv4Addr>().is_ok(),
        "ip6" => host.parse::<Ipv6Addr>().is_ok(),
        "dns" | "dns4" | "dns6" => {
            !host.is_empty()
                && host
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        }
        _ => return Err(bad_address(address, "unsupported network protocol")),
    };
    if !host_ok {
        return Err(bad_address(address, "invalid host"));
    }

    if parts.next() != Some("tcp") {
        return Err(bad_address(address, "expected a tcp component"));
    }

    match parts.next().map(str::parse::<u16>) {
        Some(Ok(port)) if port != 0 => Ok(()),
        _ => Err(bad_address(address, "invalid tcp port")),
    }
}

fn validate_cid(spec: &StorageSpec) -> CoreResult<()> {
    if spec.cid.is_empty() || !spec.cid.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CoreError::new(
            CoreErrorKind::InvalidInput,
            format!("invalid content identifier '{}'", spec.cid),
        )
        .storage(spec.engine));
    }
    Ok(())
}

fn bad_address(address: &str, reason: &str) -> CoreError {
    configuration_error(format!("invalid ipfs api address '{address}': {reason}"))
}

fn storage_error(message: String) -> CoreError {
    CoreError::new(CoreErrorKind::StorageFailure, message).storage(StorageSourceType::IpfsApiCopy)
}

fn configuration_error(message: String) -> CoreError {
    CoreError::new(CoreErrorKind::Configuration, message).storage(StorageSourceType::IpfsApiCopy)
}
