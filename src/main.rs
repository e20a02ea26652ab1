use anyhow::Context;
use blearn::cli::{self, PrepareOverrides};
use blearn::config::ProjectConfig;
use blearn::logging::init_file_logging;
use blearn::types::Keep;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "blearn")]
#[command(about = "Prepare LMS grading sheets and submission bundles for offline marking")]
#[command(long_about = "blearn - LMS submissions → marking project

Takes the grading sheet and the submission bundle downloaded from the LMS,
keeps one attempt per student, unpacks every attempt into its own folder and
writes a marking template whose rows link to those folders.

PROJECT LAYOUT (defaults, see blearn.yaml):
  <root>/blearn-1_ini/a.xls     grading sheet (tab-separated, UTF-16)
  <root>/blearn-1_ini/a.zip     submission bundle (zip or extracted folder)
  <root>/blearn-2_out/          marking project
  <root>/blearn.log             log of the last run

COMMANDS:
  prepare   - Build the marking project
  logs      - Show the attempt logs of a bundle
  grades    - Show the rows of a grading sheet

EXAMPLES:
  blearn prepare --root ~/marking/essay1
  blearn prepare --keep first --keep-empty --force
  blearn logs a.zip --json")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Build the marking project.

Reads <root>/<input_dir>/<sheet> and <root>/<input_dir>/<bundle> and writes
submission_files/<id>/ plus template-<assignment>.xlsx to <root>/<output_dir>.

blearn.yaml in the root may set: input_dir, output_dir, sheet, bundle,
log_file, keep, drop_usernames, auto_drop, drop_empty.

The output folder must be empty unless --force is given.")]
    /// Build the marking project
    Prepare {
        /// Project root
        #[arg(short, long, env = "BLEARN_ROOT", default_value = ".")]
        root: PathBuf,

        /// Write into a non-empty output folder
        #[arg(short, long)]
        force: bool,

        /// Remove students with nothing to mark
        #[arg(long, conflicts_with = "keep_empty")]
        drop_empty: bool,

        /// Keep students with nothing to mark
        #[arg(long)]
        keep_empty: bool,

        /// Attempt to keep when a student submitted more than once
        #[arg(short, long, value_enum)]
        keep: Option<Keep>,

        /// Debug logging and intermediate debug-*.xlsx tables
        #[arg(short, long)]
        debug: bool,

        /// Log file (default: <root>/<log_file>)
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Show the attempt logs of a submission bundle
    Logs {
        /// Zip archive or extracted folder
        bundle: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the rows of a grading sheet
    Grades {
        /// Grading sheet (.xls text export or workbook)
        sheet: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare {
            root,
            force,
            drop_empty,
            keep_empty,
            keep,
            debug,
            log,
        } => {
            let root = cli::project_root(root)?;
            let config = ProjectConfig::load(&root)?;
            let log = log.unwrap_or_else(|| config.log_path(&root));
            init_file_logging(&log, debug)
                .with_context(|| format!("cannot open log file {}", log.display()))?;

            let overrides = PrepareOverrides {
                force,
                drop_empty: match (drop_empty, keep_empty) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                keep,
                verbose: debug,
            };
            cli::prepare(&root, &config, &overrides)?;
            Ok(())
        }

        Commands::Logs { bundle, json } => Ok(cli::logs(bundle, json)?),

        Commands::Grades { sheet, json } => Ok(cli::grades(sheet, json)?),
    }
}
