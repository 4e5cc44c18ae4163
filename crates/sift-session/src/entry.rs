//! Per-session record and its lock-guarded runtime slot.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ComponentError;
use crate::runtime::{ComponentDescriptor, ComponentHandle, ComponentRuntime, CreateInput};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Stored, no runtime handle yet.
    Created,
    /// Runtime handle built.
    Active,
    /// Released. Never observable in the store.
    Closed,
}

impl SessionState {
    fn as_u8(self) -> u8 {
        match self {
            SessionState::Created => 0,
            SessionState::Active => 1,
            SessionState::Closed => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Created,
            1 => SessionState::Active,
            _ => SessionState::Closed,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Created => write!(f, "created"),
            SessionState::Active => write!(f, "active"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Everything needed to create a session except its id.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub tenant: String,
    pub descriptor: ComponentDescriptor,
    pub input: CreateInput,
    pub timeout: Duration,
}

/// A session managed by the cache.
///
/// Identity, creation input and deadline are immutable. The runtime handle
/// lives in a [`RuntimeSlot`] behind the entry's own mutex, so at most one
/// thread ever drives a given handle.
pub struct SessionEntry {
    id: String,
    tenant: String,
    descriptor: ComponentDescriptor,
    input: CreateInput,
    created_at: DateTime<Utc>,
    timeout: Duration,
    expires_at: Instant,
    /// Mirror of the slot state, written only while the slot lock is held.
    state: AtomicU8,
    slot: Mutex<RuntimeSlot>,
}

impl SessionEntry {
    pub(crate) fn new(id: String, new_session: NewSession) -> Self {
        let now = Instant::now();
        Self {
            id,
            tenant: new_session.tenant,
            descriptor: new_session.descriptor,
            input: new_session.input,
            created_at: Utc::now(),
            timeout: new_session.timeout,
            // Unreachable through the cache, which rejects unrepresentable
            // deadlines; an entry that cannot hold one starts expired.
            expires_at: now.checked_add(new_session.timeout).unwrap_or(now),
            state: AtomicU8::new(SessionState::Created.as_u8()),
            slot: Mutex::new(RuntimeSlot::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn component_name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    pub fn input(&self) -> &CreateInput {
        &self.input
    }

    /// Wall-clock creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute deadline, fixed at creation.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Whether the deadline has passed at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Time left before the deadline (zero once expired).
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Current state, readable without taking the entry lock.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Block until the entry lock is available.
    pub(crate) fn lock(&self) -> SlotGuard<'_> {
        SlotGuard {
            entry: self,
            slot: self.slot.lock(),
        }
    }

    /// Take the entry lock only if nobody holds it.
    pub(crate) fn try_lock(&self) -> Option<SlotGuard<'_>> {
        self.slot.try_lock().map(|slot| SlotGuard { entry: self, slot })
    }
}

impl std::fmt::Debug for SessionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEntry")
            .field("id", &self.id)
            .field("tenant", &self.tenant)
            .field("component", &self.descriptor.name)
            .field("timeout", &self.timeout)
            .field("state", &self.state())
            .finish()
    }
}

/// Lazily built runtime handle plus the authoritative state.
pub(crate) struct RuntimeSlot {
    state: SessionState,
    handle: Option<Box<dyn ComponentHandle>>,
}

impl RuntimeSlot {
    pub(crate) fn new() -> Self {
        Self {
            state: SessionState::Created,
            handle: None,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Build the handle if it does not exist yet. Never builds twice and
    /// never builds after close.
    pub(crate) fn build_if_needed(
        &mut self,
        runtime: &dyn ComponentRuntime,
        descriptor: &ComponentDescriptor,
        input: &CreateInput,
    ) -> Result<(), ComponentError> {
        if self.is_closed() {
            return Err(ComponentError::Validation(
                "component has already been closed".to_string(),
            ));
        }
        if self.handle.is_none() {
            self.handle = Some(runtime.build(descriptor, &input.configuration)?);
            self.state = SessionState::Active;
        }
        Ok(())
    }

    pub(crate) fn handle_mut(&mut self) -> Option<&mut (dyn ComponentHandle + 'static)> {
        self.handle.as_deref_mut()
    }

    pub(crate) fn handle(&self) -> Option<&dyn ComponentHandle> {
        self.handle.as_deref()
    }

    /// Transition to closed and release the handle if one was built.
    ///
    /// Returns `None` when the slot was already closed, so the runtime is
    /// never asked to close twice. A slot that never built a handle closes
    /// without calling the runtime.
    pub(crate) fn close(&mut self) -> Option<Result<Option<Value>, ComponentError>> {
        if self.is_closed() {
            return None;
        }
        self.state = SessionState::Closed;
        Some(match self.handle.take() {
            Some(handle) => handle.close(),
            None => Ok(None),
        })
    }
}

/// Exclusive access to an entry's runtime slot.
///
/// Keeps the entry's lock-free state mirror in sync with every transition.
pub(crate) struct SlotGuard<'a> {
    entry: &'a SessionEntry,
    slot: MutexGuard<'a, RuntimeSlot>,
}

impl SlotGuard<'_> {
    pub(crate) fn is_closed(&self) -> bool {
        self.slot.is_closed()
    }

    /// Build the runtime handle on first use and hand it out.
    pub(crate) fn ensure_built(
        &mut self,
        runtime: &dyn ComponentRuntime,
    ) -> Result<&mut (dyn ComponentHandle + 'static), ComponentError> {
        let entry = self.entry;
        let built = self
            .slot
            .build_if_needed(runtime, &entry.descriptor, &entry.input);
        self.sync_state();
        built?;
        self.slot
            .handle_mut()
            .ok_or_else(|| ComponentError::Validation("component handle unavailable".to_string()))
    }

    pub(crate) fn handle(&self) -> Option<&dyn ComponentHandle> {
        self.slot.handle()
    }

    pub(crate) fn close(&mut self) -> Option<Result<Option<Value>, ComponentError>> {
        let result = self.slot.close();
        self.sync_state();
        result
    }

    fn sync_state(&self) {
        self.entry
            .state
            .store(self.slot.state.as_u8(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ComponentKind, OutputColumn, Row};
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counters {
        built: AtomicUsize,
        closed: AtomicUsize,
    }

    struct CountingRuntime(Arc<Counters>);

    struct CountingHandle(Arc<Counters>);

    impl ComponentRuntime for CountingRuntime {
        fn build(
            &self,
            _descriptor: &ComponentDescriptor,
            _configuration: &crate::runtime::ComponentConfiguration,
        ) -> Result<Box<dyn ComponentHandle>, ComponentError> {
            self.0.built.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingHandle(self.0.clone())))
        }
    }

    impl ComponentHandle for CountingHandle {
        fn run(&mut self, rows: Vec<Row>) -> Result<Vec<Row>, ComponentError> {
            Ok(rows)
        }

        fn output_columns(&self) -> Vec<OutputColumn> {
            Vec::new()
        }

        fn close(self: Box<Self>) -> Result<Option<Value>, ComponentError> {
            self.0.closed.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn entry(timeout: Duration) -> SessionEntry {
        SessionEntry::new(
            "id-1".to_string(),
            NewSession {
                tenant: "acme".to_string(),
                descriptor: ComponentDescriptor::new("Echo", ComponentKind::Transformer),
                input: CreateInput::default(),
                timeout,
            },
        )
    }

    #[test]
    fn test_new_entry_is_created_without_handle() {
        let entry = entry(Duration::from_secs(60));
        assert_eq!(entry.state(), SessionState::Created);
        assert!(entry.lock().handle().is_none());
        assert!(!entry.is_expired());
        assert_eq!(entry.component_name(), "Echo");
    }

    #[test]
    fn test_expiry_is_fixed_at_creation() {
        let entry = entry(Duration::from_millis(10));
        assert_eq!(entry.expires_at(), entry.expires_at());
        assert!(entry.is_expired_at(entry.expires_at()));
        std::thread::sleep(Duration::from_millis(20));
        assert!(entry.is_expired());
        assert_eq!(entry.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_build_once_close_once() {
        let counters = Arc::new(Counters::default());
        let runtime = CountingRuntime(counters.clone());
        let entry = entry(Duration::from_secs(60));

        {
            let mut guard = entry.lock();
            guard.ensure_built(&runtime).unwrap();
            guard.ensure_built(&runtime).unwrap();
        }
        assert_eq!(entry.state(), SessionState::Active);
        assert_eq!(counters.built.load(Ordering::SeqCst), 1);

        let mut guard = entry.lock();
        assert!(guard.close().is_some());
        assert!(guard.close().is_none());
        assert!(guard.ensure_built(&runtime).is_err());
        drop(guard);

        assert_eq!(entry.state(), SessionState::Closed);
        assert_eq!(counters.built.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_without_handle_skips_runtime() {
        let counters = Arc::new(Counters::default());
        let entry = entry(Duration::from_secs(60));

        let result = entry.lock().close();
        assert!(matches!(result, Some(Ok(None))));
        assert_eq!(counters.closed.load(Ordering::SeqCst), 0);
        assert_eq!(entry.state(), SessionState::Closed);
    }

    #[test]
    fn test_try_lock_fails_while_held() {
        let entry = entry(Duration::from_secs(60));
        let guard = entry.lock();
        assert!(entry.try_lock().is_none());
        drop(guard);
        assert!(entry.try_lock().is_some());
    }
}
