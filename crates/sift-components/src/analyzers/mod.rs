//! Built-in analyzers.

mod completeness;
mod value_distribution;

pub use completeness::Completeness;
pub use value_distribution::ValueDistribution;
