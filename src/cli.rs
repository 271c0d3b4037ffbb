use crate::report::{ReportFormat, ReportMode};
use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "code-taxonomy")]
#[command(about = "Find and classify code with a declarative taxonomy of regex rules", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbosity: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search a tree with a taxonomy and report every match or per-epic counts
    Run {
        /// Taxonomy definition (TOML, YAML or JSON)
        taxonomy: PathBuf,

        /// Epics to run, by name or key ("all" for every epic); all when omitted
        epics: Vec<String>,

        /// Root directory to search
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Report mode
        #[arg(short, long, value_enum, default_value = "full")]
        mode: ReportMode,

        /// Shorthand for --mode summary
        #[arg(long, conflicts_with = "mode")]
        summary: bool,

        /// Output format (defaults to the settings file, then csv)
        #[arg(short, long, value_enum)]
        format: Option<ReportFormat>,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// URL prefix for a per-match source link column
        #[arg(long, env = "CODE_TAXONOMY_LINK_BASE")]
        link_base: Option<String>,

        /// Search hidden files and directories
        #[arg(long)]
        hidden: bool,

        /// Do not honour .gitignore files
        #[arg(long)]
        no_ignore: bool,

        /// Skip files larger than this many bytes
        #[arg(long)]
        max_file_size: Option<u64>,

        /// Scan files one at a time on the current thread
        #[arg(long)]
        no_parallel: bool,

        /// Number of worker threads (0 = one per core)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Show a progress spinner on stderr
        #[arg(long)]
        progress: bool,

        /// Report weekly `date,count` totals from git history, starting at this date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "summary")]
        from_date: Option<NaiveDate>,

        /// Last date of the history range (defaults to today)
        #[arg(long, requires = "from_date")]
        to_date: Option<NaiveDate>,
    },

    /// Validate a taxonomy and list its epics
    List {
        /// Taxonomy definition (TOML, YAML or JSON)
        taxonomy: PathBuf,
    },

    /// Write a starter taxonomy file
    Init {
        /// Where to write it
        #[arg(default_value = "taxonomy.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl Commands {
    /// Report mode selected by `--mode`/`--summary` on the run command.
    pub fn report_mode(&self) -> Option<ReportMode> {
        match self {
            Self::Run { summary: true, .. } => Some(ReportMode::Summary),
            Self::Run { mode, .. } => Some(*mode),
            _ => None,
        }
    }
}
