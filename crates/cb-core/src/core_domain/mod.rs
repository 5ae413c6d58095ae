mod error;
mod record;
mod schema;
mod strategy;
mod types;
mod unification;

pub use error::*;
pub use record::*;
pub use schema::*;
pub use strategy::*;
pub use types::*;
pub use unification::*;
