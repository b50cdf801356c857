//! Pipeline execution engine.
//!
//! Applies conversion steps in order against a table and stops at the first
//! failure. Because every step returns a new table, a failed run leaves the
//! caller's table exactly as it was.

use crate::convert::ConversionStep;
use crate::error::{FastmigError, Result};
use crate::table::Table;
use std::time::{Duration, Instant};

/// Report generated after a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Number of rows processed
    pub rows: usize,

    /// Number of columns in the result
    pub columns: usize,

    /// Number of steps applied
    pub steps_applied: usize,

    /// Time taken for execution
    pub duration: Duration,
}

impl RunReport {
    /// Create a summary message
    pub fn summary(&self) -> String {
        format!(
            "Pipeline completed: {} rows, {} columns, {} steps, {:.2}s",
            self.rows,
            self.columns,
            self.steps_applied,
            self.duration.as_secs_f64()
        )
    }
}

/// Ordered list of conversion steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformationPipeline {
    steps: Vec<ConversionStep>,
}

impl TransformationPipeline {
    pub fn new(steps: Vec<ConversionStep>) -> Self {
        Self { steps }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn add(&mut self, step: ConversionStep) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[ConversionStep] {
        &self.steps
    }

    /// Apply all steps in sequence.
    ///
    /// # Errors
    ///
    /// [`FastmigError::PipelineStepFailed`] carrying the zero-based index of
    /// the failing step and its error. No later step runs.
    pub fn apply(&self, table: &Table) -> Result<Table> {
        let mut current = table.clone();

        for (index, step) in self.steps.iter().enumerate() {
            current = step
                .apply(&current)
                .map_err(|source| FastmigError::PipelineStepFailed {
                    index,
                    source: Box::new(source),
                })?;
            log::debug!(
                "Applied step {}: {} -> {}",
                index + 1,
                step.column_name(),
                step.target_type()
            );
        }

        Ok(current)
    }

    /// Like [`apply`](Self::apply), also reporting what was done.
    ///
    /// # Errors
    ///
    /// Same as [`apply`](Self::apply).
    pub fn run(&self, table: &Table) -> Result<(Table, RunReport)> {
        let start = Instant::now();
        let result = self.apply(table)?;

        let report = RunReport {
            rows: result.height(),
            columns: result.width(),
            steps_applied: self.steps.len(),
            duration: start.elapsed(),
        };
        log::info!("{}", report.summary());

        Ok((result, report))
    }
}

/// Applies `steps` to `table` in order.
///
/// # Errors
///
/// [`FastmigError::PipelineStepFailed`] for the first step that fails.
pub fn apply(table: &Table, steps: &[ConversionStep]) -> Result<Table> {
    TransformationPipeline::new(steps.to_vec()).apply(table)
}
