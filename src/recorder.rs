//! Macro recording, persistence and replay.
//!
//! While recording, every successful conversion is appended to a buffer. A
//! finished recording is persisted as a JSON array in the format shared with
//! other implementations:
//!
//! ```json
//! [
//!   {
//!     "action_type": "convert_column",
//!     "params": { "column_name": "age", "target_type": "integer", "format_spec": null }
//!   }
//! ]
//! ```

use crate::convert::ConversionStep;
use crate::error::{FastmigError, Result};
use crate::pipeline;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Recorder lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ActionType {
    ConvertColumn,
}

/// One entry of the persisted array.
#[derive(Debug, Serialize, Deserialize)]
struct RecordedAction {
    action_type: ActionType,
    params: ConversionStep,
}

/// A named, replayable list of conversions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Macro {
    name: String,
    steps: Vec<ConversionStep>,
}

impl Macro {
    /// Names a non-empty list of steps.
    ///
    /// # Errors
    ///
    /// [`FastmigError::MalformedMacro`] for a blank name, or
    /// [`FastmigError::EmptyMacro`] when `steps` is empty.
    pub fn new(name: impl Into<String>, steps: Vec<ConversionStep>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(FastmigError::MalformedMacro(
                "macro name must not be empty".to_owned(),
            ));
        }
        if steps.is_empty() {
            return Err(FastmigError::EmptyMacro);
        }
        Ok(Self { name, steps })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[ConversionStep] {
        &self.steps
    }

    /// Default file name for this macro.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.name)
    }

    /// Serialized form (pretty JSON).
    ///
    /// # Errors
    ///
    /// [`FastmigError::WriteFailure`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let actions: Vec<RecordedAction> = self
            .steps
            .iter()
            .cloned()
            .map(|params| RecordedAction {
                action_type: ActionType::ConvertColumn,
                params,
            })
            .collect();
        serde_json::to_vec_pretty(&actions)
            .map_err(|e| FastmigError::WriteFailure(format!("Failed to serialize macro: {e}")))
    }

    /// Writes the macro into `dir` and returns the file path.
    ///
    /// # Errors
    ///
    /// Same as [`save_to_file`](Self::save_to_file).
    pub fn save_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(self.file_name());
        self.save_to_file(&path)?;
        Ok(path)
    }

    /// Writes the macro to `path`, overwriting any existing file.
    ///
    /// # Errors
    ///
    /// [`FastmigError::WriteFailure`] if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_bytes()?).map_err(|e| {
            FastmigError::WriteFailure(format!("Failed to write macro {}: {e}", path.display()))
        })?;
        log::info!("Saved macro '{}' to {}", self.name, path.display());
        Ok(())
    }
}

/// Parses persisted macro content.
///
/// # Errors
///
/// [`FastmigError::MalformedMacro`] when the content is not a list of
/// `convert_column` actions with the expected parameters.
pub fn load(bytes: &[u8]) -> Result<Vec<ConversionStep>> {
    let actions: Vec<RecordedAction> =
        serde_json::from_slice(bytes).map_err(|e| FastmigError::MalformedMacro(e.to_string()))?;
    Ok(actions.into_iter().map(|a| a.params).collect())
}

/// Reads and parses a macro file.
///
/// # Errors
///
/// [`FastmigError::FileNotFound`], [`FastmigError::ReadFailure`], or the
/// errors of [`load`].
pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<ConversionStep>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(FastmigError::FileNotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path).map_err(|e| {
        FastmigError::ReadFailure(format!("Failed to read macro {}: {e}", path.display()))
    })?;
    load(&bytes)
}

/// Captures conversions while recording.
#[derive(Debug, Clone, Default)]
pub struct MacroRecorder {
    state: RecorderState,
    buffer: Vec<ConversionStep>,
}

impl MacroRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Clears the buffer and starts recording.
    pub fn start(&mut self) {
        self.buffer.clear();
        self.state = RecorderState::Recording;
        log::debug!("Macro recording started");
    }

    /// Stops recording; the buffer is kept until the next `start`.
    pub fn stop(&mut self) {
        self.state = RecorderState::Idle;
        log::debug!("Macro recording stopped with {} steps", self.buffer.len());
    }

    /// Flips between recording and idle; returns the new state.
    pub fn toggle(&mut self) -> RecorderState {
        match self.state {
            RecorderState::Idle => self.start(),
            RecorderState::Recording => self.stop(),
        }
        self.state
    }

    /// Appends `step` if recording; ignored otherwise.
    pub fn record(&mut self, step: ConversionStep) {
        if self.is_recording() {
            self.buffer.push(step);
        }
    }

    pub fn steps(&self) -> &[ConversionStep] {
        &self.buffer
    }

    /// Snapshot of the buffer as a named macro.
    ///
    /// # Errors
    ///
    /// Same as [`Macro::new`].
    pub fn finish(&self, name: &str) -> Result<Macro> {
        Macro::new(name, self.buffer.clone())
    }

    /// Serializes the buffer.
    ///
    /// # Errors
    ///
    /// [`FastmigError::EmptyMacro`] when nothing was recorded.
    pub fn persist(&self, name: &str) -> Result<Vec<u8>> {
        self.finish(name)?.to_bytes()
    }

    /// Runs `steps` against `source`; the buffer is left alone.
    ///
    /// # Errors
    ///
    /// [`FastmigError::PipelineStepFailed`] for the first step that fails.
    pub fn replay(&self, steps: &[ConversionStep], source: &Table) -> Result<Table> {
        pipeline::apply(source, steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, DataType, Value};

    fn steps() -> Vec<ConversionStep> {
        vec![
            ConversionStep::new("age", DataType::Integer, None),
            ConversionStep::new("joined", DataType::Datetime, Some("%d/%m/%Y".to_owned())),
        ]
    }

    #[test]
    fn test_record_only_while_recording() {
        let mut recorder = MacroRecorder::new();
        recorder.record(ConversionStep::new("a", DataType::String, None));
        assert!(recorder.steps().is_empty());

        assert_eq!(recorder.toggle(), RecorderState::Recording);
        for step in steps() {
            recorder.record(step);
        }
        assert_eq!(recorder.toggle(), RecorderState::Idle);
        recorder.record(ConversionStep::new("late", DataType::String, None));

        assert_eq!(recorder.steps(), steps().as_slice());
    }

    #[test]
    fn test_start_clears_previous_buffer() {
        let mut recorder = MacroRecorder::new();
        recorder.start();
        recorder.record(ConversionStep::new("a", DataType::String, None));
        recorder.stop();
        recorder.start();
        assert!(recorder.steps().is_empty());
    }

    #[test]
    fn test_persist_empty_fails() {
        let recorder = MacroRecorder::new();
        assert!(matches!(
            recorder.persist("nothing"),
            Err(FastmigError::EmptyMacro)
        ));
    }

    #[test]
    fn test_persist_then_load_preserves_steps() -> Result<()> {
        let mut recorder = MacroRecorder::new();
        recorder.start();
        for step in steps() {
            recorder.record(step);
        }
        recorder.stop();

        let bytes = recorder.persist("cleanup")?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| FastmigError::MalformedMacro(e.to_string()))?;
        assert_eq!(
            value,
            serde_json::json!([
                {
                    "action_type": "convert_column",
                    "params": {"column_name": "age", "target_type": "integer", "format_spec": null}
                },
                {
                    "action_type": "convert_column",
                    "params": {"column_name": "joined", "target_type": "datetime", "format_spec": "%d/%m/%Y"}
                }
            ])
        );

        assert_eq!(load(&bytes)?, steps());
        Ok(())
    }

    #[test]
    fn test_load_rejects_wrong_shape() {
        for bad in [
            r#"{"action_type": "convert_column"}"#,
            r#"[{"action_type": "drop_column", "params": {"column_name": "a", "target_type": "string"}}]"#,
            r#"[{"action_type": "convert_column", "params": {"target_type": "string"}}]"#,
            "not json",
        ] {
            assert!(
                matches!(load(bad.as_bytes()), Err(FastmigError::MalformedMacro(_))),
                "expected MalformedMacro for {bad}"
            );
        }
    }

    #[test]
    fn test_load_accepts_original_aliases() -> Result<()> {
        let json = r#"[{"action_type": "convert_column", "params": {"column_name": "n", "target_type": "int"}}]"#;
        let loaded = load(json.as_bytes())?;
        assert_eq!(loaded, vec![ConversionStep::new("n", DataType::Integer, None)]);
        Ok(())
    }

    #[test]
    fn test_replay_does_not_touch_buffer() -> Result<()> {
        let table = Table::new(vec![Column::new(
            "age",
            DataType::String,
            vec![Value::String("7".to_owned())],
        )])?;
        let mut recorder = MacroRecorder::new();
        recorder.start();
        recorder.record(ConversionStep::new("other", DataType::String, None));

        let out = recorder.replay(&[ConversionStep::new("age", DataType::Integer, None)], &table)?;
        assert_eq!(out.column("age")?.get(0), Some(&Value::Integer(7)));
        assert_eq!(recorder.steps().len(), 1);
        Ok(())
    }

    #[test]
    fn test_macro_name_required() {
        assert!(matches!(
            Macro::new("  ", steps()),
            Err(FastmigError::MalformedMacro(_))
        ));
    }
}
