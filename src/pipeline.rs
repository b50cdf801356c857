//! Ordered application of recorded conversions.
//!
//! A pipeline is the executable form of a macro: the same list of
//! [`ConversionStep`](crate::convert::ConversionStep)s, applied one after the
//! other, short-circuiting on the first failure.
//!
//! ```no_run
//! use fastmig::convert::ConversionStep;
//! use fastmig::pipeline::TransformationPipeline;
//! use fastmig::table::DataType;
//!
//! # fn example(table: fastmig::table::Table) -> fastmig::error::Result<()> {
//! let pipeline = TransformationPipeline::new(vec![
//!     ConversionStep::new("age", DataType::Integer, None),
//!     ConversionStep::new("joined", DataType::Datetime, Some("%d/%m/%Y".to_owned())),
//! ]);
//! let (converted, report) = pipeline.run(&table)?;
//! println!("{} ({} rows)", report.summary(), converted.height());
//! # Ok(())
//! # }
//! ```

pub mod executor;

pub use executor::{RunReport, TransformationPipeline, apply};
