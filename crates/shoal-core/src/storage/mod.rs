pub mod api_copy;

pub use api_copy::{ApiCopyStorageProvider, ipfs_get_request, validate_multiaddr};

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use crate::catalog;
use crate::cleanup::CleanupManager;
use crate::execution::ProcessExecutor;
use crate::models::{CoreError, CoreErrorKind, CoreResult, StorageSourceType, StorageSpec};

pub type StorageResult<T> = Result<T, CoreError>;

pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = StorageResult<T>> + Send + 'a>>;

/// Makes referenced content available on the local filesystem.
pub trait StorageProvider: Send + Sync {
    fn source_type(&self) -> StorageSourceType;

    fn resolve<'a>(&'a self, spec: &'a StorageSpec) -> StorageFuture<'a, PathBuf>;
}

/// Sealed mapping from storage source to provider. Two sources may share one
/// provider instance.
#[derive(Clone, Default)]
pub struct StorageProviderRegistry {
    providers: HashMap<StorageSourceType, Arc<dyn StorageProvider>>,
}

impl StorageProviderRegistry {
    pub fn from_entries(
        entries: impl IntoIterator<Item = (StorageSourceType, Arc<dyn StorageProvider>)>,
    ) -> CoreResult<Self> {
        let mut providers = HashMap::new();
        for (source, provider) in entries {
            if providers.insert(source, provider).is_some() {
                return Err(CoreError::new(
                    CoreErrorKind::Configuration,
                    format!("duplicate storage provider registration for '{source}'"),
                )
                .storage(source));
            }
        }
        Ok(Self { providers })
    }

    pub fn lookup(&self, source: StorageSourceType) -> Option<Arc<dyn StorageProvider>> {
        self.providers.get(&source).cloned()
    }

    pub fn contains(&self, source: StorageSourceType) -> bool {
        self.providers.contains_key(&source)
    }

    pub fn sources(&self) -> Vec<StorageSourceType> {
        let mut sources = self.providers.keys().copied().collect::<Vec<_>>();
        sources.sort();
        sources
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub async fn resolve(&self, spec: &StorageSpec) -> StorageResult<PathBuf> {
        let provider = self.lookup(spec.engine).ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::StorageFailure,
                format!("no storage provider is registered for '{}'", spec.engine),
            )
            .storage(spec.engine)
        })?;
        provider.resolve(spec).await
    }
}

/// Builds the storage providers a standard node exposes to jobs.
///
/// Every catalogued source that is not policy-excluded is served by one shared
/// API copy provider, so the FUSE mount driver is never reachable by jobs.
pub fn build_storage_providers(
    cleanup: &CleanupManager,
    ipfs_api: &str,
    process: Arc<dyn ProcessExecutor>,
    cache_root: &Path,
) -> CoreResult<StorageProviderRegistry> {
    let api_copy: Arc<dyn StorageProvider> = Arc::new(ApiCopyStorageProvider::new(
        cleanup, ipfs_api, process, cache_root,
    )?);

    let registry = StorageProviderRegistry::from_entries(
        catalog::storage_sources()
            .iter()
            .filter(|descriptor| !descriptor.policy_excluded)
            .map(|descriptor| (descriptor.id, api_copy.clone())),
    )?;

    tracing::info!(
        sources = ?registry.sources(),
        ipfs_api = %ipfs_api,
        "storage providers ready"
    );
    Ok(registry)
}
