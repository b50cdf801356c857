//! The editing session: one open table with its history, the macro recorder
//! and the file it came from.
//!
//! Front ends hold a [`Session`] and call its operations; nothing here is
//! global, so several sessions can coexist (one per test, one per window).

use crate::config::AppSettings;
use crate::convert::{ConversionStep, TargetType};
use crate::error::{FastmigError, Result};
use crate::history::{HistoryManager, HistoryStatus};
use crate::io::TableIo;
use crate::pipeline::{RunReport, TransformationPipeline};
use crate::recorder::{self, MacroRecorder, RecorderState};
use crate::table::{DataType, Table};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// What a front end needs to offer conversions for one column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: DataType,
    pub null_count: usize,
    pub suggested_targets: &'static [DataType],
}

/// One open table, its undo history and the macro recorder.
#[derive(Debug)]
pub struct Session {
    history: HistoryManager,
    recorder: MacroRecorder,
    io: TableIo,
    path: Option<PathBuf>,
    settings: AppSettings,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            history: HistoryManager::new(),
            recorder: MacroRecorder::new(),
            io: TableIo::default(),
            path: None,
            settings: AppSettings::default(),
        }
    }
}

impl Session {
    /// Session configured from `settings`.
    ///
    /// # Errors
    ///
    /// [`FastmigError::Config`] if the configured CSV delimiter is unusable.
    pub fn new(settings: AppSettings) -> Result<Self> {
        let io = TableIo::with_delimiter(settings.delimiter_byte()?);
        let history = match settings.history_depth {
            Some(depth) => HistoryManager::with_max_depth(depth),
            None => HistoryManager::new(),
        };
        Ok(Self {
            history,
            recorder: MacroRecorder::new(),
            io,
            path: None,
            settings,
        })
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// File the current table was opened from or last saved to.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn recorder(&self) -> &MacroRecorder {
        &self.recorder
    }

    /// The active table.
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`] before a file has been opened.
    pub fn current(&self) -> Result<&Table> {
        self.history.current()
    }

    /// First `preview_row_limit` rows of the current table.
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`] before a file has been opened.
    pub fn preview(&self) -> Result<Table> {
        Ok(self.current()?.head(self.settings.preview_row_limit))
    }

    /// Loads `path` as the current table. History starts over.
    ///
    /// # Errors
    ///
    /// Same as [`TableIo::load`]; the session is unchanged on failure.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<&Table> {
        let path = path.as_ref();
        let table = self.io.load(path)?;
        self.history.load(table);
        self.path = Some(path.to_path_buf());
        self.history.current()
    }

    /// Converts one column of the current table.
    ///
    /// On success the previous table becomes undoable and, while recording,
    /// the step is appended to the macro buffer. On failure nothing changes.
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`], or any error of [`crate::convert::convert`].
    pub fn convert(
        &mut self,
        column: &str,
        target: impl Into<TargetType>,
        format_spec: Option<&str>,
    ) -> Result<()> {
        let step = ConversionStep::new(column, target, format_spec.map(str::to_owned));
        let converted = step.apply(self.history.current()?)?;
        self.history.replace(converted)?;
        self.recorder.record(step);
        Ok(())
    }

    /// Renames columns; undoable but never recorded.
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`], or any error of [`Table::rename_columns`].
    pub fn rename_columns(&mut self, mapping: &HashMap<String, String>) -> Result<()> {
        let renamed = self.history.current()?.rename_columns(mapping)?;
        self.history.replace(renamed)
    }

    /// See [`HistoryManager::undo`].
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`] before a file has been opened.
    pub fn undo(&mut self) -> Result<HistoryStatus> {
        self.history.undo()
    }

    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`] before a file has been opened.
    pub fn redo(&mut self) -> Result<HistoryStatus> {
        self.history.redo()
    }

    /// Writes the current table back to [`path`](Self::path).
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`], [`FastmigError::NoOutputPath`] when the
    /// session has no file, or any error of [`TableIo::save`].
    pub fn save(&mut self) -> Result<PathBuf> {
        self.current()?;
        let path = self.path.clone().ok_or(FastmigError::NoOutputPath)?;
        self.write_and_checkpoint(&path)?;
        Ok(path)
    }

    /// Writes the current table to `path`, which becomes the session path.
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`], or any error of [`TableIo::save`].
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.write_and_checkpoint(path)?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    fn write_and_checkpoint(&mut self, path: &Path) -> Result<()> {
        self.io.save(self.history.current()?, path)?;
        self.history.checkpoint()
    }

    pub fn start_recording(&mut self) {
        self.recorder.start();
    }

    pub fn stop_recording(&mut self) {
        self.recorder.stop();
    }

    pub fn toggle_recording(&mut self) -> RecorderState {
        self.recorder.toggle()
    }

    /// Saves the recorded steps as `<name>.json` in `dir`, or in the
    /// configured macro directory.
    ///
    /// # Errors
    ///
    /// [`FastmigError::EmptyMacro`] when nothing was recorded, or a write failure.
    pub fn save_recording(&self, name: &str, dir: Option<&Path>) -> Result<PathBuf> {
        let dir = dir.unwrap_or(&self.settings.macro_dir);
        self.recorder.finish(name)?.save_to_dir(dir)
    }

    /// Replays the macro at `macro_path` over the table in `data_path`.
    ///
    /// The loaded table becomes the undo target and the replayed result the
    /// current table. When `output` is given, the result is also written
    /// there. Replayed steps are never recorded.
    ///
    /// # Errors
    ///
    /// Errors from loading the macro or the data file, and
    /// [`FastmigError::PipelineStepFailed`] for the first failing step. The
    /// session is unchanged in those cases.
    pub fn replay_macro(
        &mut self,
        macro_path: impl AsRef<Path>,
        data_path: impl AsRef<Path>,
        output: Option<&Path>,
    ) -> Result<RunReport> {
        let steps = recorder::load_file(macro_path)?;
        let data_path = data_path.as_ref();
        let source = self.io.load(data_path)?;

        let (result, report) = TransformationPipeline::new(steps).run(&source)?;

        self.history.load(source);
        self.history.replace(result)?;
        self.path = Some(data_path.to_path_buf());

        if let Some(output) = output {
            self.io.save(self.history.current()?, output)?;
        }
        Ok(report)
    }

    /// Re-reads the opened file, converts one column of the fresh copy and
    /// optionally exports the result.
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`] when no file was opened, then the errors of
    /// loading, converting and saving.
    pub fn process(
        &mut self,
        column: &str,
        target: impl Into<TargetType>,
        output: Option<&Path>,
    ) -> Result<()> {
        let path = self.path.clone().ok_or(FastmigError::NoTableLoaded)?;
        let fresh = self.io.load(&path)?;

        let step = ConversionStep::new(column, target, None);
        let converted = step.apply(&fresh)?;
        self.history.replace(converted)?;
        self.recorder.record(step);

        if let Some(output) = output {
            self.io.save(self.history.current()?, output)?;
        }
        Ok(())
    }

    /// Type, null count and suggested targets of one column.
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`] or [`FastmigError::ColumnNotFound`].
    pub fn column_info(&self, name: &str) -> Result<ColumnInfo> {
        let column = self.current()?.column(name)?;
        Ok(ColumnInfo {
            name: column.name().to_owned(),
            dtype: column.dtype(),
            null_count: column.null_count(),
            suggested_targets: column.dtype().suggested_targets(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;
    use std::fs;

    fn write_people(dir: &Path) -> Result<PathBuf> {
        let path = dir.join("people.csv");
        fs::write(&path, "name,age,score\nann,31,A\nbob,x,B\ncyd,27,A\n")
            .map_err(|e| FastmigError::WriteFailure(e.to_string()))?;
        Ok(path)
    }

    fn scratch() -> Result<tempfile::TempDir> {
        tempfile::tempdir().map_err(|e| FastmigError::WriteFailure(e.to_string()))
    }

    #[test]
    fn test_operations_without_table() {
        let mut session = Session::default();
        assert!(matches!(session.undo(), Err(FastmigError::NoTableLoaded)));
        assert!(matches!(
            session.convert("a", DataType::Integer, None),
            Err(FastmigError::NoTableLoaded)
        ));
        assert!(matches!(session.save(), Err(FastmigError::NoTableLoaded)));
        assert!(matches!(
            session.process("a", DataType::Integer, None),
            Err(FastmigError::NoTableLoaded)
        ));
    }

    #[test]
    fn test_failed_convert_changes_nothing() -> Result<()> {
        let dir = scratch()?;
        let mut session = Session::default();
        session.open(write_people(dir.path())?)?;
        session.start_recording();

        let before = session.current()?.clone();
        let err = session.convert("age", DataType::Integer, None).unwrap_err();
        assert!(matches!(err, FastmigError::ConversionFailed { .. }));
        assert_eq!(session.current()?, &before);
        assert!(!session.history().can_undo());
        assert!(session.recorder().steps().is_empty());
        Ok(())
    }

    #[test]
    fn test_convert_records_and_undoes() -> Result<()> {
        let dir = scratch()?;
        let mut session = Session::default();
        session.open(write_people(dir.path())?)?;
        session.start_recording();

        session.convert("score", TargetType::parse("category"), None)?;
        assert_eq!(
            session.current()?.column("score")?.dtype(),
            DataType::Category
        );
        assert_eq!(session.recorder().steps().len(), 1);

        assert_eq!(session.undo()?, HistoryStatus::Applied);
        assert_eq!(session.current()?.column("score")?.dtype(), DataType::String);
        assert_eq!(session.undo()?, HistoryStatus::NothingToUndo);
        Ok(())
    }

    #[test]
    fn test_rename_is_not_recorded() -> Result<()> {
        let dir = scratch()?;
        let mut session = Session::default();
        session.open(write_people(dir.path())?)?;
        session.start_recording();

        let mapping = HashMap::from([("name".to_owned(), "full_name".to_owned())]);
        session.rename_columns(&mapping)?;
        assert!(session.current()?.column("full_name").is_ok());
        assert!(session.recorder().steps().is_empty());

        session.undo()?;
        assert!(session.current()?.column("name").is_ok());
        Ok(())
    }

    #[test]
    fn test_save_requires_path_and_checkpoints() -> Result<()> {
        let dir = scratch()?;
        let mut session = Session::default();
        session.open(write_people(dir.path())?)?;

        let out = dir.path().join("out.csv");
        session.save_as(&out)?;
        assert_eq!(session.path(), Some(out.as_path()));
        assert_eq!(session.history().undo_depth(), 1);

        let reread = TableIo::default().load(&out)?;
        assert_eq!(reread.column_names(), vec!["name", "age", "score"]);
        Ok(())
    }

    #[test]
    fn test_record_then_replay() -> Result<()> {
        let dir = scratch()?;
        let data = write_people(dir.path())?;
        let mut session = Session::default();
        session.open(&data)?;

        session.start_recording();
        session.convert("score", DataType::Category, None)?;
        session.convert("name", DataType::String, None)?;
        session.stop_recording();
        let macro_path = session.save_recording("tidy", Some(dir.path()))?;
        assert_eq!(macro_path, dir.path().join("tidy.json"));

        let mut fresh = Session::default();
        let out = dir.path().join("replayed.csv");
        let report = fresh.replay_macro(&macro_path, &data, Some(&out))?;
        assert_eq!(report.steps_applied, 2);
        assert_eq!(fresh.current()?.column("score")?.dtype(), DataType::Category);
        assert!(out.exists());

        fresh.undo()?;
        assert_eq!(fresh.current()?.column("score")?.dtype(), DataType::String);
        Ok(())
    }

    #[test]
    fn test_save_recording_empty_fails() {
        let session = Session::default();
        assert!(matches!(
            session.save_recording("nothing", None),
            Err(FastmigError::EmptyMacro)
        ));
    }

    #[test]
    fn test_process_rereads_source() -> Result<()> {
        let dir = scratch()?;
        let mut session = Session::default();
        session.open(write_people(dir.path())?)?;
        session.convert("score", DataType::Category, None)?;

        session.process("name", DataType::Category, None)?;
        let current = session.current()?;
        assert_eq!(current.column("name")?.dtype(), DataType::Category);
        assert_eq!(current.column("score")?.dtype(), DataType::String);
        Ok(())
    }

    #[test]
    fn test_column_info_suggestions() -> Result<()> {
        let dir = scratch()?;
        let mut session = Session::default();
        session.open(write_people(dir.path())?)?;

        let info = session.column_info("score")?;
        assert_eq!(info.dtype, DataType::String);
        assert_eq!(
            info.suggested_targets,
            &[DataType::String, DataType::Category, DataType::Boolean]
        );

        let preview = session.preview()?;
        assert_eq!(preview.height(), 3);
        assert_eq!(
            preview.column("name")?.get(0),
            Some(&Value::String("ann".to_owned()))
        );
        Ok(())
    }
}
