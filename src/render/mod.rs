//! Serializable view models for forms, tables and detail pages.

pub mod detail;
pub mod form;
pub mod list;
pub mod table;

pub use detail::{render_detail, DetailView};
pub use form::{render_controls, render_form, Control, DependentState, FormValues, FormView, Input};
pub use table::{render_table, Column, TableOptions, TableView};
