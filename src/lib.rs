//! # fastmig - column type conversion for tabular files
//!
//! fastmig loads a CSV or Excel file into an in-memory [`table::Table`],
//! converts columns to semantic types (integer, decimal, string, boolean,
//! category, datetime, object, binary), keeps an undo/redo history of every
//! change and records conversions as macros that can be replayed on other
//! files.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fastmig::session::Session;
//! use fastmig::table::DataType;
//!
//! # fn example() -> fastmig::error::Result<()> {
//! let mut session = Session::default();
//! session.open("people.csv")?;
//!
//! session.start_recording();
//! session.convert("age", DataType::Integer, None)?;
//! session.convert("joined", DataType::Datetime, Some("%d/%m/%Y"))?;
//! session.stop_recording();
//!
//! session.save_as("people_clean.xlsx")?;
//! session.save_recording("tidy_people", None)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`table`]: typed columns and tables
//! - [`convert`]: single-column conversion and [`convert::ConversionStep`]
//! - [`pipeline`]: ordered application of steps
//! - [`history`]: undo/redo snapshots
//! - [`recorder`]: macro recording, persistence and replay
//! - [`io`]: CSV and Excel reading/writing
//! - [`session`]: the context object front ends drive
//! - [`config`]: user settings
//! - [`error`]: error types
//!
//! ## Conversions are all-or-nothing
//!
//! A conversion that cannot cast a value, or that leaves a null in the
//! column, fails with a [`error::FastmigError`] and the table is unchanged:
//!
//! ```
//! use fastmig::convert::convert;
//! use fastmig::error::FastmigError;
//! use fastmig::table::{Column, DataType, Table, Value};
//!
//! let table = Table::new(vec![Column::new(
//!     "age",
//!     DataType::String,
//!     vec![Value::String("31".into()), Value::String("x".into())],
//! )])?;
//!
//! let err = convert(&table, "age", &DataType::Integer.into(), None).unwrap_err();
//! assert!(matches!(err, FastmigError::ConversionFailed { .. }));
//! # Ok::<(), FastmigError>(())
//! ```

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod convert;
pub mod error;
pub mod history;
pub mod io;
pub mod pipeline;
pub mod recorder;
pub mod session;
pub mod table;
