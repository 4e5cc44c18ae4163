//! The session cache façade.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::CacheConfig;
use crate::entry::{NewSession, SessionEntry, SessionState, SlotGuard};
use crate::error::{Error, Result};
use crate::runtime::{
    ComponentDescriptor, ComponentRuntime, CreateInput, DescriptorResolver, OutputColumn, Row,
};
use crate::store::SessionStore;
use crate::sweeper::{EvictionSweeper, SweepReport};

/// Observable summary of a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub component: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub timeout_ms: u64,
    pub remaining_ms: u64,
}

impl SessionInfo {
    fn from_entry(entry: &SessionEntry) -> Self {
        Self {
            id: entry.id().to_string(),
            component: entry.component_name().to_string(),
            state: entry.state(),
            created_at: entry.created_at(),
            timeout_ms: saturating_millis(entry.timeout()),
            remaining_ms: saturating_millis(entry.remaining()),
        }
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Output of a stateless invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatelessOutput {
    /// Rows produced by the component, in input order.
    pub rows: Vec<Row>,
    /// Final result returned when the component was closed.
    pub result: Option<Value>,
    /// Columns of `rows`.
    pub columns: Vec<OutputColumn>,
}

struct SweeperTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct CacheInner {
    store: Arc<SessionStore>,
    resolver: Arc<dyn DescriptorResolver>,
    runtime: Arc<dyn ComponentRuntime>,
    config: CacheConfig,
    sweeper: Mutex<Option<SweeperTask>>,
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        if let Some(task) = self.sweeper.get_mut().take() {
            task.cancel.cancel();
        }
    }
}

/// Tenant-scoped cache of component sessions.
///
/// Cloning is cheap; clones share the same store and sweeper. Every
/// operation except [`SessionCache::shutdown`] is synchronous and may block
/// on a session's lock or on the component runtime, so async callers should
/// run them on the blocking pool.
#[derive(Clone)]
pub struct SessionCache {
    inner: Arc<CacheInner>,
}

impl SessionCache {
    /// Create a cache over the given collaborators.
    ///
    /// The sweeper is not started; call [`SessionCache::spawn_sweeper`] from
    /// within a tokio runtime.
    pub fn new(
        config: CacheConfig,
        resolver: Arc<dyn DescriptorResolver>,
        runtime: Arc<dyn ComponentRuntime>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(CacheInner {
                store: Arc::new(SessionStore::new()),
                resolver,
                runtime,
                config,
                sweeper: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Timeout applied when a caller does not choose one.
    pub fn default_timeout(&self) -> Duration {
        self.inner.config.default_timeout
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Create a session and return its id.
    ///
    /// The component is resolved but not built; construction happens on the
    /// first [`SessionCache::process`] call.
    pub fn create_session(
        &self,
        tenant: &str,
        component_name: &str,
        input: CreateInput,
        timeout: Duration,
    ) -> Result<String> {
        self.check_timeout(timeout)?;
        let descriptor = self.resolve(component_name)?;
        check_required_properties(&descriptor, &input)?;

        let entry = self.inner.store.put(NewSession {
            tenant: tenant.to_string(),
            descriptor,
            input,
            timeout,
        });

        debug!(
            tenant = %tenant,
            session_id = %entry.id(),
            component = %entry.component_name(),
            timeout_ms = saturating_millis(timeout),
            "Session created"
        );
        Ok(entry.id().to_string())
    }

    /// Push a batch of rows through a session's component.
    ///
    /// Calls against the same session are serialized; each batch is applied
    /// whole and in order. A failure to build or run the component closes
    /// and removes the session.
    pub fn process(&self, tenant: &str, id: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        self.check_batch(rows.len())?;
        let entry = self.lookup(tenant, id)?;

        let mut guard = entry.lock();
        if guard.is_closed() {
            return Err(Error::SessionNotFound(id.to_string()));
        }
        if entry.is_expired() {
            // The deadline passed while this call waited for the lock.
            self.release(&entry, &mut guard, "expiry");
            return Err(Error::SessionNotFound(id.to_string()));
        }

        let handle = match guard.ensure_built(self.inner.runtime.as_ref()) {
            Ok(handle) => handle,
            Err(source) => {
                warn!(
                    tenant = %tenant,
                    session_id = %id,
                    component = %entry.component_name(),
                    error = %source,
                    "Component initialization failed, discarding session"
                );
                self.release(&entry, &mut guard, "initialization failure");
                return Err(Error::SessionInitializationFailed {
                    component: entry.component_name().to_string(),
                    source,
                });
            }
        };

        let batch_size = rows.len();
        match handle.run(rows) {
            Ok(output) => {
                trace!(
                    tenant = %tenant,
                    session_id = %id,
                    rows_in = batch_size,
                    rows_out = output.len(),
                    "Batch processed"
                );
                Ok(output)
            }
            Err(source) => {
                warn!(
                    tenant = %tenant,
                    session_id = %id,
                    component = %entry.component_name(),
                    error = %source,
                    "Component failed while processing, discarding session"
                );
                self.release(&entry, &mut guard, "processing failure");
                Err(Error::RuntimeProcessing {
                    component: entry.component_name().to_string(),
                    source,
                })
            }
        }
    }

    /// Build a component, run all rows through it and close it, without
    /// ever storing a session.
    pub fn process_once(
        &self,
        tenant: &str,
        component_name: &str,
        input: CreateInput,
        rows: Vec<Row>,
    ) -> Result<StatelessOutput> {
        self.check_batch(rows.len())?;
        let descriptor = self.resolve(component_name)?;
        check_required_properties(&descriptor, &input)?;

        let mut handle = self
            .inner
            .runtime
            .build(&descriptor, &input.configuration)
            .map_err(|source| Error::SessionInitializationFailed {
                component: descriptor.name.clone(),
                source,
            })?;
        let columns = handle.output_columns();

        let rows = match handle.run(rows) {
            Ok(rows) => rows,
            Err(source) => {
                if let Err(e) = handle.close() {
                    warn!(tenant = %tenant, component = %descriptor.name, error = %e, "Failed to close component");
                }
                return Err(Error::RuntimeProcessing {
                    component: descriptor.name,
                    source,
                });
            }
        };

        let result = handle.close().map_err(|source| Error::RuntimeProcessing {
            component: descriptor.name.clone(),
            source,
        })?;

        trace!(tenant = %tenant, component = %descriptor.name, rows_out = rows.len(), "Stateless invocation finished");
        Ok(StatelessOutput {
            rows,
            result,
            columns,
        })
    }

    /// Close a session, remove it and return its final result.
    pub fn finalize(&self, tenant: &str, id: &str) -> Result<Option<Value>> {
        let entry = self.lookup(tenant, id)?;

        let mut guard = entry.lock();
        if entry.is_expired() {
            self.release(&entry, &mut guard, "expiry");
            return Err(Error::SessionNotFound(id.to_string()));
        }
        let closed = guard.close();
        self.inner.store.remove_entry(&entry);
        drop(guard);

        match closed {
            None => Err(Error::SessionNotFound(id.to_string())),
            Some(Ok(result)) => {
                debug!(tenant = %tenant, session_id = %id, "Session finalized");
                Ok(result)
            }
            Some(Err(source)) => Err(Error::RuntimeProcessing {
                component: entry.component_name().to_string(),
                source,
            }),
        }
    }

    /// Close and remove a session, discarding its result.
    ///
    /// A failure while closing is logged, not returned: the session is gone
    /// either way.
    pub fn remove(&self, tenant: &str, id: &str) -> Result<()> {
        match self.finalize(tenant, id) {
            Ok(_) => Ok(()),
            Err(Error::RuntimeProcessing { component, source }) => {
                warn!(
                    tenant = %tenant,
                    session_id = %id,
                    component = %component,
                    error = %source,
                    "Session removed, but its component failed to close"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Build a component just long enough to read its output columns.
    pub fn output_columns(
        &self,
        component_name: &str,
        input: &CreateInput,
    ) -> Result<Vec<OutputColumn>> {
        let descriptor = self.resolve(component_name)?;
        check_required_properties(&descriptor, input)?;

        let handle = self
            .inner
            .runtime
            .build(&descriptor, &input.configuration)
            .map_err(|source| Error::SessionInitializationFailed {
                component: descriptor.name.clone(),
                source,
            })?;
        let columns = handle.output_columns();
        if let Err(e) = handle.close() {
            warn!(component = %descriptor.name, error = %e, "Failed to close component");
        }
        Ok(columns)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────────────

    /// Live sessions of a tenant, oldest first.
    pub fn list(&self, tenant: &str) -> Vec<SessionInfo> {
        let mut sessions: Vec<_> = self
            .inner
            .store
            .tenant_entries(tenant)
            .iter()
            .map(|entry| SessionInfo::from_entry(entry))
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        sessions
    }

    /// Number of stored sessions across all tenants, including expired ones
    /// not yet swept.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// Every component the resolver knows about.
    pub fn descriptors(&self) -> Vec<ComponentDescriptor> {
        self.inner.resolver.descriptors()
    }

    pub fn descriptor(&self, component_name: &str) -> Option<ComponentDescriptor> {
        self.inner.resolver.resolve(component_name)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Eviction and shutdown
    // ─────────────────────────────────────────────────────────────────────

    /// Start the background sweeper on the current tokio runtime.
    ///
    /// Returns false if the sweeper is disabled or already running.
    pub fn spawn_sweeper(&self) -> bool {
        if !self.inner.config.enable_sweeper {
            debug!("Sweeper disabled by configuration");
            return false;
        }

        let mut slot = self.inner.sweeper.lock();
        if slot.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let sweeper = EvictionSweeper::new(self.inner.store.clone(), self.inner.config.sweep_interval);
        let handle = sweeper.spawn(cancel.clone());
        *slot = Some(SweeperTask { cancel, handle });

        info!(
            interval_ms = saturating_millis(self.inner.config.sweep_interval),
            "Session sweeper started"
        );
        true
    }

    /// Run one eviction sweep on the calling thread.
    pub fn sweep_now(&self) -> SweepReport {
        EvictionSweeper::new(self.inner.store.clone(), self.inner.config.sweep_interval).sweep()
    }

    /// Stop the sweeper and close every remaining session.
    ///
    /// Returns the number of sessions closed.
    pub async fn shutdown(&self) -> usize {
        let task = self.inner.sweeper.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                warn!(error = %e, "Sweeper task ended abnormally");
            }
        }

        let store = self.inner.store.clone();
        let closed = match tokio::task::spawn_blocking(move || close_all(&store)).await {
            Ok(closed) => closed,
            Err(e) => {
                warn!(error = %e, "Failed to close sessions on shutdown");
                0
            }
        };

        info!(closed, "Session cache shut down");
        closed
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn lookup(&self, tenant: &str, id: &str) -> Result<Arc<SessionEntry>> {
        self.inner
            .store
            .get(tenant, id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    fn resolve(&self, component_name: &str) -> Result<ComponentDescriptor> {
        self.inner.resolver.resolve(component_name).ok_or_else(|| {
            Error::InvalidConfiguration(format!("unknown component: {component_name}"))
        })
    }

    fn check_timeout(&self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Err(Error::InvalidConfiguration(
                "timeout must be greater than zero".to_string(),
            ));
        }
        let min = self.inner.config.min_timeout;
        if timeout < min {
            return Err(Error::InvalidConfiguration(format!(
                "timeout of {} ms is below the minimum of {} ms",
                timeout.as_millis(),
                min.as_millis()
            )));
        }
        if Instant::now().checked_add(timeout).is_none() {
            return Err(Error::InvalidConfiguration(format!(
                "timeout of {} ms is too large",
                timeout.as_millis()
            )));
        }
        Ok(())
    }

    fn check_batch(&self, size: usize) -> Result<()> {
        match self.inner.config.max_batch_size {
            Some(max) if size > max => Err(Error::BatchTooLarge { size, max }),
            _ => Ok(()),
        }
    }

    /// Close a locked entry's runtime, best effort, and drop it from the store.
    fn release(&self, entry: &Arc<SessionEntry>, guard: &mut SlotGuard<'_>, reason: &str) {
        if let Some(Err(e)) = guard.close() {
            warn!(
                tenant = %entry.tenant(),
                session_id = %entry.id(),
                component = %entry.component_name(),
                error = %e,
                "Failed to close session after {reason}"
            );
        }
        self.inner.store.remove_entry(entry);
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("config", &self.inner.config)
            .field("sessions", &self.inner.store.len())
            .finish()
    }
}

fn check_required_properties(descriptor: &ComponentDescriptor, input: &CreateInput) -> Result<()> {
    let missing: Vec<&str> = descriptor
        .properties
        .iter()
        .filter(|p| p.required && input.configuration.property(&p.name).is_none())
        .map(|p| p.name.as_str())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidConfiguration(format!(
            "component '{}' is missing required properties: {}",
            descriptor.name,
            missing.join(", ")
        )))
    }
}

fn close_all(store: &SessionStore) -> usize {
    let mut closed = 0;
    for entry in store.drain() {
        let mut guard = entry.lock();
        match guard.close() {
            Some(Ok(_)) => closed += 1,
            Some(Err(e)) => {
                closed += 1;
                warn!(
                    tenant = %entry.tenant(),
                    session_id = %entry.id(),
                    error = %e,
                    "Failed to close session on shutdown"
                );
            }
            None => {}
        }
    }
    closed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComponentError;
    use crate::runtime::{
        ComponentConfiguration, ComponentHandle, ComponentKind, PropertyDescriptor,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        built: AtomicUsize,
        closed: AtomicUsize,
        overlaps: AtomicUsize,
        running: AtomicBool,
        batches: Mutex<Vec<Vec<Row>>>,
    }

    /// Components used by the tests:
    /// - `Uppercase` uppercases every string value
    /// - `Counter` is an analyzer whose result is the number of rows seen
    /// - `Broken` fails to build
    /// - `Exploding` fails on any row containing "boom"
    /// - `Needy` requires a `column` property
    struct MockComponents {
        counters: Arc<Counters>,
    }

    struct MockHandle {
        name: String,
        counters: Arc<Counters>,
        seen: usize,
    }

    impl DescriptorResolver for MockComponents {
        fn resolve(&self, name: &str) -> Option<ComponentDescriptor> {
            let descriptor = match name {
                "Uppercase" | "Broken" | "Exploding" => {
                    ComponentDescriptor::new(name, ComponentKind::Transformer)
                }
                "Counter" => ComponentDescriptor::new(name, ComponentKind::Analyzer),
                "Needy" => ComponentDescriptor::new(name, ComponentKind::Transformer)
                    .with_property(PropertyDescriptor::new("column", "").required()),
                _ => return None,
            };
            Some(descriptor)
        }

        fn descriptors(&self) -> Vec<ComponentDescriptor> {
            ["Uppercase", "Counter"]
                .iter()
                .filter_map(|name| self.resolve(name))
                .collect()
        }
    }

    impl ComponentRuntime for MockComponents {
        fn build(
            &self,
            descriptor: &ComponentDescriptor,
            _configuration: &ComponentConfiguration,
        ) -> std::result::Result<Box<dyn ComponentHandle>, ComponentError> {
            if descriptor.name == "Broken" {
                return Err(ComponentError::Validation("no such column".into()));
            }
            self.counters.built.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockHandle {
                name: descriptor.name.clone(),
                counters: self.counters.clone(),
                seen: 0,
            }))
        }
    }

    impl ComponentHandle for MockHandle {
        fn run(&mut self, rows: Vec<Row>) -> std::result::Result<Vec<Row>, ComponentError> {
            if self.counters.running.swap(true, Ordering::SeqCst) {
                self.counters.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(1));
            self.counters.batches.lock().push(rows.clone());
            self.counters.running.store(false, Ordering::SeqCst);

            if self.name == "Exploding" && rows.iter().flatten().any(|v| v == "boom") {
                return Err(ComponentError::Execution("boom".into()));
            }
            self.seen += rows.len();
            if self.name == "Counter" {
                return Ok(Vec::new());
            }
            Ok(rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|v| match v {
                            Value::String(s) => Value::String(s.to_uppercase()),
                            other => other,
                        })
                        .collect()
                })
                .collect())
        }

        fn output_columns(&self) -> Vec<OutputColumn> {
            vec![OutputColumn::new("value (upper)", "string")]
        }

        fn close(self: Box<Self>) -> std::result::Result<Option<Value>, ComponentError> {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            if self.name == "Counter" {
                Ok(Some(json!({ "rows": self.seen })))
            } else {
                Ok(None)
            }
        }
    }

    fn test_config() -> CacheConfig {
        CacheConfig::new()
            .with_min_timeout(Duration::from_millis(10))
            .with_sweep_interval(Duration::from_millis(5))
    }

    fn cache_with(config: CacheConfig) -> (SessionCache, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let components = Arc::new(MockComponents {
            counters: counters.clone(),
        });
        let cache = SessionCache::new(config, components.clone(), components).unwrap();
        (cache, counters)
    }

    fn cache() -> (SessionCache, Arc<Counters>) {
        cache_with(test_config())
    }

    fn rows(values: &[&str]) -> Vec<Row> {
        values.iter().map(|v| vec![json!(v)]).collect()
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_uppercase_session_expires() {
        let (cache, _) = cache_with(CacheConfig::default());
        let id = cache
            .create_session("acme", "Uppercase", CreateInput::default(), Duration::from_millis(50))
            .unwrap();

        let output = cache.process("acme", &id, rows(&["a", "b"])).unwrap();
        assert_eq!(output, rows(&["A", "B"]));

        std::thread::sleep(Duration::from_millis(100));
        let result = cache.process("acme", &id, rows(&["c"]));
        assert!(matches!(result, Err(Error::SessionNotFound(_))));
    }

    #[test]
    fn test_create_does_not_build() {
        let (cache, counters) = cache();
        let id = cache
            .create_session("acme", "Uppercase", CreateInput::default(), MINUTE)
            .unwrap();

        assert_eq!(counters.built.load(Ordering::SeqCst), 0);
        assert_eq!(cache.list("acme")[0].state, SessionState::Created);

        cache.process("acme", &id, rows(&["x"])).unwrap();
        cache.process("acme", &id, rows(&["y"])).unwrap();
        assert_eq!(counters.built.load(Ordering::SeqCst), 1);
        assert_eq!(cache.list("acme")[0].state, SessionState::Active);
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let (cache, _) = cache();
        let input = CreateInput::default();

        let unknown = cache.create_session("acme", "Nope", input.clone(), MINUTE);
        assert!(matches!(unknown, Err(Error::InvalidConfiguration(_))));

        let zero = cache.create_session("acme", "Uppercase", input.clone(), Duration::ZERO);
        assert!(matches!(zero, Err(Error::InvalidConfiguration(_))));

        let short = cache.create_session("acme", "Uppercase", input.clone(), Duration::from_millis(1));
        assert!(matches!(short, Err(Error::InvalidConfiguration(_))));

        let huge = cache.create_session("acme", "Uppercase", input.clone(), Duration::MAX);
        assert!(matches!(huge, Err(Error::InvalidConfiguration(_))));

        let missing = cache.create_session("acme", "Needy", input, MINUTE);
        assert!(matches!(missing, Err(Error::InvalidConfiguration(_))));

        assert!(cache.is_empty());
    }

    #[test]
    fn test_lookup_consistency_before_sweep() {
        let (cache, _) = cache_with(test_config().with_sweeper(false));
        let id = cache
            .create_session("acme", "Uppercase", CreateInput::default(), Duration::from_millis(30))
            .unwrap();

        assert!(cache.process("acme", &id, rows(&["a"])).is_ok());
        assert_eq!(cache.list("acme").len(), 1);

        std::thread::sleep(Duration::from_millis(40));
        // Nothing has swept yet, but the session is already gone for readers.
        assert_eq!(cache.len(), 1);
        assert!(cache.list("acme").is_empty());
        assert!(matches!(
            cache.finalize("acme", &id),
            Err(Error::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_batches_are_serialized() {
        let (cache, counters) = cache();
        let id = cache
            .create_session("acme", "Uppercase", CreateInput::default(), MINUTE)
            .unwrap();

        let threads: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                let id = id.clone();
                std::thread::spawn(move || {
                    for seq in 0..10 {
                        let tag = format!("t{t}-{seq}");
                        let batch = vec![vec![json!(tag)]; 3];
                        cache.process("acme", &id, batch).unwrap();
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }

        assert_eq!(counters.overlaps.load(Ordering::SeqCst), 0);
        let batches = counters.batches.lock();
        assert_eq!(batches.len(), 80);
        for batch in batches.iter() {
            assert_eq!(batch.len(), 3);
            assert!(batch.iter().all(|row| row == &batch[0]));
        }
        assert_eq!(counters.built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_twice_closes_once() {
        let (cache, counters) = cache();
        let id = cache
            .create_session("acme", "Uppercase", CreateInput::default(), MINUTE)
            .unwrap();
        cache.process("acme", &id, rows(&["a"])).unwrap();

        assert!(cache.remove("acme", &id).is_ok());
        assert!(matches!(
            cache.remove("acme", &id),
            Err(Error::SessionNotFound(_))
        ));
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        assert!(matches!(
            cache.process("acme", &id, rows(&["b"])),
            Err(Error::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_remove_unbuilt_session_skips_runtime() {
        let (cache, counters) = cache();
        let id = cache
            .create_session("acme", "Uppercase", CreateInput::default(), MINUTE)
            .unwrap();

        cache.remove("acme", &id).unwrap();
        assert_eq!(counters.built.load(Ordering::SeqCst), 0);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_finalize_returns_analyzer_result() {
        let (cache, _) = cache();
        let id = cache
            .create_session("acme", "Counter", CreateInput::default(), MINUTE)
            .unwrap();
        assert!(cache.process("acme", &id, rows(&["a", "b"])).unwrap().is_empty());
        cache.process("acme", &id, rows(&["c"])).unwrap();

        let result = cache.finalize("acme", &id).unwrap();
        assert_eq!(result, Some(json!({ "rows": 3 })));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_initialization_failure_discards_session() {
        let (cache, counters) = cache();
        let id = cache
            .create_session("acme", "Broken", CreateInput::default(), MINUTE)
            .unwrap();

        let result = cache.process("acme", &id, rows(&["a"]));
        assert!(matches!(
            result,
            Err(Error::SessionInitializationFailed { .. })
        ));
        assert!(cache.is_empty());
        assert_eq!(counters.closed.load(Ordering::SeqCst), 0);
        assert!(matches!(
            cache.process("acme", &id, rows(&["a"])),
            Err(Error::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_processing_failure_closes_and_discards() {
        let (cache, counters) = cache();
        let id = cache
            .create_session("acme", "Exploding", CreateInput::default(), MINUTE)
            .unwrap();
        cache.process("acme", &id, rows(&["fine"])).unwrap();

        let result = cache.process("acme", &id, rows(&["boom"]));
        assert!(matches!(result, Err(Error::RuntimeProcessing { .. })));
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_batch_limit_leaves_session_untouched() {
        let (cache, counters) = cache_with(test_config().with_max_batch_size(2));
        let id = cache
            .create_session("acme", "Uppercase", CreateInput::default(), MINUTE)
            .unwrap();

        let result = cache.process("acme", &id, rows(&["a", "b", "c"]));
        assert!(matches!(
            result,
            Err(Error::BatchTooLarge { size: 3, max: 2 })
        ));
        assert_eq!(counters.built.load(Ordering::SeqCst), 0);
        assert_eq!(cache.process("acme", &id, rows(&["a", "b"])).unwrap().len(), 2);
    }

    #[test]
    fn test_stateless_matches_session_path() {
        let (cache, _) = cache();
        let input = CreateInput::default();
        let batch = rows(&["a", "b", "c"]);

        let once = cache
            .process_once("acme", "Uppercase", input.clone(), batch.clone())
            .unwrap();

        let id = cache.create_session("acme", "Uppercase", input, MINUTE).unwrap();
        let stepwise = cache.process("acme", &id, batch).unwrap();
        let result = cache.finalize("acme", &id).unwrap();

        assert_eq!(once.rows, stepwise);
        assert_eq!(once.result, result);
        assert_eq!(once.columns, vec![OutputColumn::new("value (upper)", "string")]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stateless_analyzer_result() {
        let (cache, counters) = cache();
        let output = cache
            .process_once("acme", "Counter", CreateInput::default(), rows(&["a", "b"]))
            .unwrap();

        assert!(output.rows.is_empty());
        assert_eq!(output.result, Some(json!({ "rows": 2 })));
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_tenant_isolation_with_injected_id() {
        let (cache, _) = cache();
        let descriptor = ComponentDescriptor::new("Uppercase", ComponentKind::Transformer);
        cache.inner.store.put_with_id(
            "shared",
            NewSession {
                tenant: "acme".to_string(),
                descriptor,
                input: CreateInput::default(),
                timeout: MINUTE,
            },
        );

        assert!(matches!(
            cache.process("globex", "shared", rows(&["a"])),
            Err(Error::SessionNotFound(_))
        ));
        assert!(matches!(
            cache.remove("globex", "shared"),
            Err(Error::SessionNotFound(_))
        ));
        assert!(cache.list("globex").is_empty());
        assert!(cache.process("acme", "shared", rows(&["a"])).is_ok());
    }

    #[test]
    fn test_output_columns_preview_stores_nothing() {
        let (cache, counters) = cache();
        let columns = cache
            .output_columns("Uppercase", &CreateInput::default())
            .unwrap();

        assert_eq!(columns.len(), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_now_reclaims_expired() {
        let (cache, counters) = cache_with(test_config().with_sweeper(false));
        let id = cache
            .create_session("acme", "Uppercase", CreateInput::default(), Duration::from_millis(20))
            .unwrap();
        cache.process("acme", &id, rows(&["a"])).unwrap();

        std::thread::sleep(Duration::from_millis(30));
        let report = cache.sweep_now();

        assert_eq!(report.evicted, 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_bounded_eviction_delay() {
        let config = CacheConfig::new()
            .with_min_timeout(Duration::from_millis(30))
            .with_sweep_interval(Duration::from_millis(20));
        let (cache, counters) = cache_with(config);
        assert!(cache.spawn_sweeper());
        assert!(!cache.spawn_sweeper());

        let id = cache
            .create_session("acme", "Uppercase", CreateInput::default(), Duration::from_millis(50))
            .unwrap();
        let worker = cache.clone();
        tokio::task::spawn_blocking(move || worker.process("acme", &id, rows(&["a"])))
            .await
            .unwrap()
            .unwrap();

        // timeout + one interval, plus scheduling slack
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.is_empty());
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);

        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything_once() {
        let (cache, counters) = cache();
        cache.spawn_sweeper();

        for tenant in ["acme", "globex"] {
            let id = cache
                .create_session(tenant, "Uppercase", CreateInput::default(), MINUTE)
                .unwrap();
            let worker = cache.clone();
            tokio::task::spawn_blocking(move || worker.process(tenant, &id, rows(&["a"])))
                .await
                .unwrap()
                .unwrap();
        }
        cache
            .create_session("acme", "Uppercase", CreateInput::default(), MINUTE)
            .unwrap();

        assert_eq!(cache.shutdown().await, 3);
        assert!(cache.is_empty());
        assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
        assert_eq!(cache.shutdown().await, 0);
    }

    #[test]
    fn test_list_reports_live_sessions() {
        let (cache, _) = cache();
        let first = cache
            .create_session("acme", "Uppercase", CreateInput::default(), MINUTE)
            .unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let second = cache
            .create_session("acme", "Counter", CreateInput::default(), MINUTE)
            .unwrap();
        cache
            .create_session("globex", "Uppercase", CreateInput::default(), MINUTE)
            .unwrap();

        let listed = cache.list("acme");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first);
        assert_eq!(listed[1].id, second);
        assert_eq!(listed[1].component, "Counter");
        assert_eq!(listed[0].timeout_ms, 60_000);
        assert!(listed[0].remaining_ms <= 60_000);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_very_long_timeout_saturates_in_listing() {
        let (cache, _) = cache();
        let timeout = Duration::from_secs(u64::MAX / 1000 + 1);
        cache
            .create_session("acme", "Uppercase", CreateInput::default(), timeout)
            .unwrap();

        let listed = cache.list("acme");
        assert_eq!(listed[0].timeout_ms, u64::MAX);
        assert_eq!(listed[0].remaining_ms, u64::MAX);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let counters = Arc::new(Counters::default());
        let components = Arc::new(MockComponents { counters });
        let config = CacheConfig::new().with_sweep_interval(Duration::from_secs(5));
        assert!(SessionCache::new(config, components.clone(), components).is_err());
    }
}
