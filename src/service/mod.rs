//! Record services: validation, write payloads, CRUD execution, filters, options,
//! attendance and CSV import/export.

pub mod attendance;
pub mod coerce;
mod crud;
pub mod csv_io;
pub mod filter;
pub mod input;
pub mod options;
pub mod selector;
pub mod validation;

pub use attendance::{AttendanceDay, AttendanceService, MonthRef};
pub use crud::{nest_dotted, CrudService, Page};
pub use filter::{QueryFilterBuilder, ReadQuery};
pub use input::{FormInput, RawValue, UploadedFile};
pub use selector::{SelectorBuilder, WriteMode};
pub use validation::{SchemaValidator, ValidatedValues};
