use crate::bundle::{metadata_from_logs, SubmissionBundle};
use crate::config::ProjectConfig;
use crate::core::{prepare_project, PreparedProject, CORRUPT_MARKER};
use crate::error::{BlearnError, BlearnResult};
use crate::excel::GradeSheetImporter;
use crate::types::{Cell, GradeSheet, Keep, SubmissionLog};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Command-line overrides of [`ProjectConfig`] for `prepare`
#[derive(Debug, Clone, Default)]
pub struct PrepareOverrides {
    /// Write into a non-empty output folder
    pub force: bool,
    pub drop_empty: Option<bool>,
    pub keep: Option<Keep>,
    /// Also write the intermediate `debug-*.xlsx` tables
    pub verbose: bool,
}

/// Execute the prepare command
pub fn prepare(
    root: &Path,
    config: &ProjectConfig,
    overrides: &PrepareOverrides,
) -> BlearnResult<PreparedProject> {
    let sheet = config.sheet_path(root);
    let bundle = config.bundle_path(root);
    let output = config.output_path(root);

    println!("{}", "📚 blearn - Preparing marking project".bold().green());
    println!("   Grading sheet: {}", sheet.display());
    println!("   Submissions:   {}", bundle.display());
    println!("   Output:        {}\n", output.display());

    fs::create_dir_all(&output)?;

    let mut options = config.prepare_options();
    options.safe = !overrides.force;
    options.verbose = overrides.verbose;
    if let Some(drop_empty) = overrides.drop_empty {
        options.drop_empty = drop_empty;
    }
    if let Some(keep) = overrides.keep {
        options.keep = keep;
    }
    info!(?options, "prepare options");

    let project = prepare_project(&sheet, &bundle, &output, &options)?;

    let submitted = project.rows.iter().filter(|r| r.submission.is_some()).count();
    println!("{}", "✅ Project ready".bold().green());
    println!("   Assignment: {}", project.assignment.bright_blue().bold());
    println!(
        "   Rows: {} ({} with a submission)",
        project.rows.len(),
        submitted
    );
    println!("   Template: {}\n", project.template.display());

    if project.errors > 0 {
        println!(
            "{}",
            format!(
                "⚠️  {} submission(s) could not be extracted; look for `{}` in the student folders",
                project.errors, CORRUPT_MARKER
            )
            .bold()
            .yellow()
        );
    }
    Ok(project)
}

/// Execute the logs command
pub fn logs(bundle: PathBuf, json: bool) -> BlearnResult<()> {
    let bundle = SubmissionBundle::open(&bundle)?;
    let logs = metadata_from_logs(&bundle)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&logs)?);
        return Ok(());
    }

    println!("{}", "📄 blearn - Attempt logs".bold().green());
    println!("   Bundle: {}\n", bundle.path().display());
    if logs.is_empty() {
        println!("{}", "⚠️  No attempt logs found".yellow());
        return Ok(());
    }
    for log in &logs {
        print_log(log);
    }
    println!("\n   {} attempt(s)", logs.len());
    Ok(())
}

fn print_log(log: &SubmissionLog) {
    println!(
        "   {} {} - {}",
        log.id.bright_blue().bold(),
        log.name,
        log.submitted_at.format("%Y-%m-%d %H:%M:%S %:z")
    );
    if !log.current_mark.is_empty() {
        println!("      Mark: {}", log.current_mark.cyan());
    }
    for file in &log.files {
        println!("      {} ({})", file.original, file.stored.dimmed());
    }
}

/// Execute the grades command
pub fn grades(sheet: PathBuf, json: bool) -> BlearnResult<()> {
    let grade_sheet = GradeSheetImporter::new(&sheet).import()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&grade_sheet)?);
        return Ok(());
    }

    println!("{}", "📊 blearn - Grading sheet".bold().green());
    println!("   File: {}\n", sheet.display());
    print_grade_sheet(&grade_sheet);
    Ok(())
}

fn print_grade_sheet(sheet: &GradeSheet) {
    if !sheet.extra_columns.is_empty() {
        println!("   Extra columns: {}", sheet.extra_columns.join(", ").cyan());
    }
    for row in &sheet.rows {
        let last_access = match &row.last_access {
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Cell::Text(s) => s.clone(),
            _ => "-".to_string(),
        };
        println!(
            "   {} {} (last access: {})",
            row.id.bright_blue().bold(),
            row.full_name(),
            last_access
        );
    }
    println!("\n   {} student(s)", sheet.len());
}

/// Resolve the project root: the given folder, which must exist
pub fn project_root(root: PathBuf) -> BlearnResult<PathBuf> {
    if !root.is_dir() {
        return Err(BlearnError::Validation(format!(
            "Project root is not a folder: {}",
            root.display()
        )));
    }
    Ok(root)
}
