//! Response extraction and tabular normalisation.
//!
//! Raw JSON goes through two pure, total stages:
//!
//! 1. [`extract_records`] picks the record list out of whatever envelope the
//!    endpoint used, producing an [`Envelope`].
//! 2. [`clean_records`] turns those records into a [`Frame`] with snake_case
//!    columns, typed year/value columns, no all-null or duplicate rows, and a
//!    trailing [`PROVENANCE_COLUMN`].
//!
//! # Example
//!
//! ```
//! use faostat_core::frame::{Cell, clean_response};
//! use serde_json::json;
//!
//! let frame = clean_response(json!({"data": [{"Year": "2020", "Value": "5.5"}]}));
//! assert_eq!(frame.column("year").unwrap(), vec![&Cell::Int(2020)]);
//! assert_eq!(frame.column("value").unwrap(), vec![&Cell::Float(5.5)]);
//! ```

mod cleaner;
mod envelope;
mod naming;
mod table;

pub use cleaner::{PROVENANCE_COLUMN, VALUE_COLUMNS, clean_records, clean_records_at, clean_response};
pub use envelope::{ENVELOPE_KEYS, Envelope, EnvelopeSource, extract_records, has_data};
pub use naming::to_snake_case;
pub use table::{Cell, CellKey, ColumnType, Frame};
