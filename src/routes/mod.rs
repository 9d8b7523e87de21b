//! Router assembly.

mod common;
mod entity;

pub use common::common_routes;
pub use entity::console_routes;
