//! Command-line interface: `inspect`, `convert`, `replay` and `rename`.
//!
//! Every subcommand drives a [`Session`] built from the loaded settings.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use fastmig::config::AppSettings;
use fastmig::convert::TargetType;
use fastmig::session::Session;
use fastmig::table::Table;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fastmig", about = "Column type conversion for CSV and Excel files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show column types and the first rows of a file
    Inspect {
        /// CSV or Excel file
        file: PathBuf,

        /// Rows to preview. Defaults to `preview_row_limit` from the config.
        #[arg(short, long)]
        rows: Option<usize>,

        /// Only describe this column, with the targets it can be converted to
        #[arg(short, long)]
        column: Option<String>,
    },
    /// Convert one column and save the result
    Convert {
        /// CSV or Excel file
        file: PathBuf,

        /// Column to convert
        #[arg(short, long)]
        column: String,

        /// Target type (integer, decimal, string, boolean, category, datetime, object, binary)
        #[arg(short, long)]
        to: String,

        /// strftime pattern for datetime targets (e.g. "%d/%m/%Y")
        #[arg(short, long)]
        format: Option<String>,

        /// Output file. Defaults to overwriting the input.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also save the conversion as a macro with this name
        #[arg(long)]
        record: Option<String>,

        /// Directory for the recorded macro. Defaults to `macro_dir` from the config.
        #[arg(long, requires = "record")]
        macro_dir: Option<PathBuf>,
    },
    /// Apply a recorded macro to a file
    Replay {
        /// Macro JSON file
        #[arg(short, long = "macro")]
        macro_file: PathBuf,

        /// CSV or Excel file to transform
        file: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Rename columns
    Rename {
        /// CSV or Excel file
        file: PathBuf,

        /// Renames as OLD=NEW; repeatable
        #[arg(short, long = "map", value_parser = parse_mapping, required = true)]
        mappings: Vec<(String, String)>,

        /// Output file. Defaults to overwriting the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_mapping(arg: &str) -> Result<(String, String), String> {
    let (old, new) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected OLD=NEW, got '{arg}'"))?;
    if old.is_empty() || new.is_empty() {
        return Err(format!("expected OLD=NEW, got '{arg}'"));
    }
    Ok((old.to_owned(), new.to_owned()))
}

/// Runs one subcommand to completion, printing progress to stdout.
///
/// # Errors
///
/// Returns error if the settings are invalid or any load, conversion, replay
/// or save step fails. The error carries the file or column involved.
pub fn run_command(command: Commands, settings: AppSettings) -> Result<()> {
    let mut session = Session::new(settings).context("Invalid configuration")?;

    match command {
        Commands::Inspect { file, rows, column } => {
            handle_inspect(&mut session, &file, rows, column.as_deref())
        }
        Commands::Convert {
            file,
            column,
            to,
            format,
            output,
            record,
            macro_dir,
        } => handle_convert(
            &mut session,
            &file,
            &column,
            &to,
            format.as_deref(),
            output,
            record.as_deref(),
            macro_dir.as_deref(),
        ),
        Commands::Replay {
            macro_file,
            file,
            output,
        } => {
            let report = session
                .replay_macro(&macro_file, &file, Some(&output))
                .with_context(|| format!("Failed to replay {}", macro_file.display()))?;
            println!("{}", report.summary());
            println!("Saved to {}", output.display());
            Ok(())
        }
        Commands::Rename {
            file,
            mappings,
            output,
        } => {
            session
                .open(&file)
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let mapping: HashMap<String, String> = mappings.into_iter().collect();
            session.rename_columns(&mapping)?;
            save(&mut session, output)
        }
    }
}

fn handle_inspect(
    session: &mut Session,
    file: &Path,
    rows: Option<usize>,
    column: Option<&str>,
) -> Result<()> {
    session
        .open(file)
        .with_context(|| format!("Failed to open {}", file.display()))?;

    if let Some(name) = column {
        let info = session.column_info(name)?;
        println!("{}: {} ({} nulls)", info.name, info.dtype, info.null_count);
        let targets: Vec<&str> = info.suggested_targets.iter().map(|t| t.as_str()).collect();
        println!("Suggested targets: {}", targets.join(", "));
        return Ok(());
    }

    let table = session.current()?;
    println!(
        "{}: {} rows, {} columns",
        file.display(),
        table.height(),
        table.width()
    );
    for column in table.columns() {
        println!("  {:<24} {:<10} {} nulls", column.name(), column.dtype(), column.null_count());
    }

    let preview = match rows {
        Some(n) => table.head(n),
        None => session.preview()?,
    };
    println!();
    print_table(&preview);
    Ok(())
}

#[expect(clippy::too_many_arguments)]
fn handle_convert(
    session: &mut Session,
    file: &Path,
    column: &str,
    to: &str,
    format: Option<&str>,
    output: Option<PathBuf>,
    record: Option<&str>,
    macro_dir: Option<&Path>,
) -> Result<()> {
    session
        .open(file)
        .with_context(|| format!("Failed to open {}", file.display()))?;

    if record.is_some() {
        session.start_recording();
    }
    session
        .convert(column, TargetType::parse(to), format)
        .with_context(|| format!("Failed to convert '{column}' to {to}"))?;
    println!("Converted '{column}' to {to}");

    if let Some(name) = record {
        session.stop_recording();
        let path = session.save_recording(name, macro_dir)?;
        println!("Macro saved to {}", path.display());
    }

    save(session, output)
}

fn save(session: &mut Session, output: Option<PathBuf>) -> Result<()> {
    let path = match output {
        Some(path) => {
            session
                .save_as(&path)
                .with_context(|| format!("Failed to save {}", path.display()))?;
            path
        }
        None => session.save().context("Failed to save")?,
    };
    println!("Saved to {}", path.display());
    Ok(())
}

fn print_table(table: &Table) {
    let names = table.column_names();
    println!("{}", names.join("\t"));
    for idx in 0..table.height() {
        let cells: Vec<String> = table
            .row(idx)
            .unwrap_or_default()
            .into_iter()
            .map(|cell| cell.unwrap_or_else(|| "null".to_owned()))
            .collect();
        println!("{}", cells.join("\t"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_mapping() {
        assert_eq!(
            parse_mapping("old=new"),
            Ok(("old".to_owned(), "new".to_owned()))
        );
        assert!(parse_mapping("old").is_err());
        assert!(parse_mapping("=new").is_err());
    }

    #[test]
    fn test_rename_requires_mapping() {
        assert!(Cli::try_parse_from(["fastmig", "rename", "data.csv"]).is_err());
        assert!(
            Cli::try_parse_from(["fastmig", "rename", "data.csv", "--map", "a=b", "-m", "c=d"])
                .is_ok()
        );
    }
}
