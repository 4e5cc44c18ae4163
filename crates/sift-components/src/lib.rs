//! Built-in components for Sift sessions.
//!
//! [`ComponentRegistry`] implements both [`sift_session::DescriptorResolver`]
//! and [`sift_session::ComponentRuntime`], so a single registry can back a
//! [`sift_session::SessionCache`]:
//!
//! ```rust,ignore
//! let registry = Arc::new(ComponentRegistry::builtin());
//! let cache = SessionCache::new(CacheConfig::default(), registry.clone(), registry)?;
//! ```

pub mod analyzers;
pub mod columns;
mod component;
mod registry;
pub mod transformers;

pub use columns::{ColumnBinding, InputColumn};
pub use component::{Analyzer, AnalyzerHandle, Component, Transformer, TransformerHandle};
pub use registry::ComponentRegistry;
