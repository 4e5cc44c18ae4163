//! Ephemeral, tenant-scoped component sessions.
//!
//! A session wraps one instance of a processing component (a transformer or
//! an analyzer) that callers feed row batches over several requests:
//! - Creation is cheap; the component is built lazily on first use
//! - Batches for one session are applied strictly one at a time
//! - Sessions expire at an absolute deadline and are reclaimed by a
//!   background sweeper
//! - A component's resources are released exactly once
//!
//! # Example
//!
//! ```rust,ignore
//! use sift_session::{CacheConfig, CreateInput, SessionCache};
//!
//! let cache = SessionCache::new(CacheConfig::default(), resolver, runtime)?;
//! cache.spawn_sweeper();
//!
//! let id = cache.create_session("acme", "Uppercase", CreateInput::default(), timeout)?;
//! let rows = cache.process("acme", &id, vec![vec!["a".into()]])?;
//! let result = cache.finalize("acme", &id)?;
//! ```

mod cache;
mod config;
mod entry;
mod error;
mod runtime;
mod store;
mod sweeper;

pub use cache::{SessionCache, SessionInfo, StatelessOutput};
pub use config::{CacheConfig, DEFAULT_MIN_TIMEOUT, DEFAULT_SESSION_TIMEOUT, DEFAULT_SWEEP_INTERVAL};
pub use entry::{NewSession, SessionEntry, SessionState};
pub use error::{ComponentError, Error, Result};
pub use runtime::{
    ComponentConfiguration, ComponentDescriptor, ComponentHandle, ComponentKind,
    ComponentRuntime, CreateInput, DescriptorResolver, OutputColumn, PATH_SEPARATOR_TOKEN,
    PropertyDescriptor, Row, escape_component_name, unescape_component_name,
};
pub use store::SessionStore;
pub use sweeper::{EvictionSweeper, SweepReport};
