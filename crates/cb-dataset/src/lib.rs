//! Dataset configuration and training-data assembly on top of `cb-core`.

pub mod dataset;
pub mod error;
pub mod training;

pub use dataset::*;
pub use error::*;
pub use training::*;
