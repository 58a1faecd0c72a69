use std::fmt::{Debug, Formatter};
use std::sync::{Arc, OnceLock, Weak};

use crate::executors::Executor;
use crate::models::{CoreError, CoreErrorKind, CoreResult, EngineType};

/// One write-once slot per engine type, addressed by `EngineType::index`.
struct ExecutorSlots {
    slots: [OnceLock<Arc<dyn Executor>>; EngineType::COUNT],
}

impl ExecutorSlots {
    fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| OnceLock::new()),
        }
    }

    fn get(&self, engine: EngineType) -> Option<&Arc<dyn Executor>> {
        self.slots.get(engine.index()).and_then(OnceLock::get)
    }

    fn engines(&self) -> Vec<EngineType> {
        EngineType::ALL
            .into_iter()
            .filter(|engine| self.get(*engine).is_some())
            .collect()
    }
}

/// Collects executors during start-up. The only type that can insert.
pub struct RegistryBuilder {
    slots: Arc<ExecutorSlots>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(ExecutorSlots::new()),
        }
    }

    /// Fills the slot for `engine`. A filled slot is never replaced.
    pub fn insert(&mut self, engine: EngineType, executor: Arc<dyn Executor>) -> CoreResult<()> {
        let slot = self.slots.slots.get(engine.index()).ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::Internal,
                format!("no registry slot exists for engine '{engine}'"),
            )
            .engine(engine)
        })?;

        slot.set(executor).map_err(|_| {
            CoreError::new(
                CoreErrorKind::Internal,
                format!("duplicate executor registration for engine '{engine}'"),
            )
            .engine(engine)
        })?;

        tracing::debug!(engine = %engine, "executor registered");
        Ok(())
    }

    pub fn contains(&self, engine: EngineType) -> bool {
        self.slots.get(engine).is_some()
    }

    /// A read-only view that also sees entries inserted after it was taken.
    pub fn lookup_handle(&self) -> ExecutorLookup {
        ExecutorLookup {
            slots: Arc::downgrade(&self.slots),
        }
    }

    pub fn seal(self) -> CapabilityRegistry {
        CapabilityRegistry { slots: self.slots }
    }
}

/// Lookup capability handed to meta-executors.
///
/// Holds the arena weakly: executors stored in the registry can carry their
/// own handle without keeping the registry alive.
#[derive(Clone)]
pub struct ExecutorLookup {
    slots: Weak<ExecutorSlots>,
}

impl ExecutorLookup {
    pub fn lookup(&self, engine: EngineType) -> Option<Arc<dyn Executor>> {
        self.slots.upgrade()?.get(engine).cloned()
    }

    /// Resolves the delegate `requester` needs, at call time.
    pub fn resolve(
        &self,
        engine: EngineType,
        requester: EngineType,
    ) -> CoreResult<Arc<dyn Executor>> {
        let Some(slots) = self.slots.upgrade() else {
            return Err(CoreError::new(
                CoreErrorKind::Delegation,
                format!("{requester} executor outlived its registry while resolving '{engine}'"),
            )
            .engine(requester));
        };

        slots.get(engine).cloned().ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::Delegation,
                format!("{requester} executor could not find a delegate for engine '{engine}'"),
            )
            .engine(requester)
        })
    }
}

impl Debug for ExecutorLookup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorLookup")
            .field("live", &(self.slots.strong_count() > 0))
            .finish()
    }
}

/// Sealed mapping from engine type to executor. Read-only and lock-free.
#[derive(Clone)]
pub struct CapabilityRegistry {
    slots: Arc<ExecutorSlots>,
}

impl CapabilityRegistry {
    pub fn lookup(&self, engine: EngineType) -> Option<Arc<dyn Executor>> {
        self.slots.get(engine).cloned()
    }

    pub fn contains(&self, engine: EngineType) -> bool {
        self.slots.get(engine).is_some()
    }

    pub fn engines(&self) -> Vec<EngineType> {
        self.slots.engines()
    }

    pub fn len(&self) -> usize {
        self.engines().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("engines", &self.engines())
            .finish()
    }
}
