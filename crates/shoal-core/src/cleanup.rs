use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::models::{CoreError, CoreErrorKind, CoreResult};

pub type CleanupFuture = Pin<Box<dyn Future<Output = CoreResult<()>> + Send>>;

type CleanupCallback = Box<dyn FnOnce() -> CleanupFuture + Send>;

struct CleanupEntry {
    name: String,
    callback: CleanupCallback,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CleanupReport {
    pub ran: usize,
    pub failures: Vec<(String, CoreError)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Teardown callbacks collected while providers and executors are built.
///
/// Every callback runs exactly once, on the first `cleanup` call after it was
/// registered, newest first.
#[derive(Default)]
pub struct CleanupManager {
    entries: Mutex<Vec<CleanupEntry>>,
}

impl CleanupManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        callback: impl FnOnce() -> CleanupFuture + Send + 'static,
    ) -> CoreResult<()> {
        let name = name.into();
        let mut entries = self.lock_entries()?;
        tracing::debug!(callback = %name, "registered cleanup callback");
        entries.push(CleanupEntry {
            name,
            callback: Box::new(callback),
        });
        Ok(())
    }

    pub fn register_sync(
        &self,
        name: impl Into<String>,
        callback: impl FnOnce() -> CoreResult<()> + Send + 'static,
    ) -> CoreResult<()> {
        self.register(name, move || {
            let result = callback();
            Box::pin(async move { result }) as CleanupFuture
        })
    }

    pub fn pending(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub async fn cleanup(&self) -> CleanupReport {
        let drained = match self.lock_entries() {
            Ok(mut entries) => std::mem::take(&mut *entries),
            Err(error) => {
                tracing::error!(message = %error.message, "cleanup sweep skipped");
                return CleanupReport {
                    ran: 0,
                    failures: vec![("cleanup-manager".to_string(), error)],
                };
            }
        };

        let mut report = CleanupReport::default();
        for entry in drained.into_iter().rev() {
            report.ran += 1;
            if let Err(error) = (entry.callback)().await {
                tracing::error!(
                    callback = %entry.name,
                    kind = ?error.kind,
                    message = %error.message,
                    "cleanup callback failed"
                );
                report.failures.push((entry.name, error));
            }
        }

        tracing::info!(
            ran = report.ran,
            failed = report.failures.len(),
            "cleanup sweep finished"
        );
        report
    }

    fn lock_entries(&self) -> CoreResult<std::sync::MutexGuard<'_, Vec<CleanupEntry>>> {
        self.entries.lock().map_err(|_| {
            CoreError::new(CoreErrorKind::Internal, "cleanup manager mutex poisoned")
        })
    }
}
