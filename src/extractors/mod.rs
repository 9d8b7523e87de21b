//! Request extractors.

mod form;

pub use form::Submitted;
