//! Built-in transformers.

mod concatenator;
mod string_length;
mod uppercase;

pub use concatenator::Concatenator;
pub use string_length::StringLength;
pub use uppercase::Uppercase;
