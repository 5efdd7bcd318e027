//! Roster file ingestion.

pub mod csv;

pub use csv::{parse_csv, CsvError};
