//! Safe SQL builder: identifiers from config only, values as parameters.

pub mod attendance;
mod builder;
pub mod params;
pub mod predicate;
pub use builder::*;
pub use params::*;
pub use predicate::*;
