use anyhow::{Context, Result};
use clap::Parser;
use code_taxonomy::cli::{Cli, Commands};
use code_taxonomy::commands::{
    init_taxonomy, list_epics, run, run_history, HistoryOptions, RunOptions,
};
use code_taxonomy::config::{load_settings, Settings};
use code_taxonomy::progress::ProgressConfig;
use code_taxonomy::{load_taxonomy, ScanWarning, WarningSink};
use colored::Colorize;
use std::io::Write;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbosity);

    let mode = cli.command.report_mode();
    match cli.command {
        Commands::Run {
            taxonomy,
            epics,
            path,
            format,
            output,
            link_base,
            hidden,
            no_ignore,
            max_file_size,
            no_parallel,
            jobs,
            progress,
            from_date,
            to_date,
            ..
        } => {
            let settings = load_settings();
            if let Some(from) = from_date {
                let options = HistoryOptions {
                    root: path,
                    from,
                    to: to_date.unwrap_or_else(|| chrono::Local::now().date_naive()),
                    format: format.unwrap_or(settings.output.format),
                    epics,
                    search: build_search_options(&settings, hidden, no_ignore, max_file_size),
                };
                return handle_history(&taxonomy, &options, output.as_deref());
            }

            let options = RunOptions {
                root: path,
                mode: mode.unwrap_or_default(),
                format: format.unwrap_or(settings.output.format),
                epics,
                parallel: settings.search.parallel && !no_parallel,
                jobs: jobs.unwrap_or(settings.search.jobs),
                search: build_search_options(&settings, hidden, no_ignore, max_file_size),
                link_base: link_base.or_else(|| settings.output.link_base.clone()),
                progress: ProgressConfig::from_env(progress),
            };
            handle_run(&taxonomy, &options, output.as_deref())
        }
        Commands::List { taxonomy } => {
            let taxonomy = load_taxonomy(&taxonomy)?;
            let stdout = std::io::stdout();
            list_epics(&taxonomy, &mut stdout.lock())?;
            Ok(())
        }
        Commands::Init { path, force } => init_taxonomy(&path, force),
    }
}

fn handle_run(taxonomy_path: &Path, options: &RunOptions, output: Option<&Path>) -> Result<()> {
    let taxonomy = load_taxonomy(taxonomy_path)?;

    let mut report = Vec::new();
    let mut warnings = StderrWarnings;
    let summary = run(&taxonomy, options, &mut report, &mut warnings)?;

    write_report(&report, output)?;

    log::info!(
        "{} matches for {} epics, {} files skipped",
        summary.matches,
        summary.epics,
        summary.warnings
    );
    Ok(())
}

fn handle_history(
    taxonomy_path: &Path,
    options: &HistoryOptions,
    output: Option<&Path>,
) -> Result<()> {
    let taxonomy = load_taxonomy(taxonomy_path)?;

    let mut report = Vec::new();
    let snapshots = run_history(&taxonomy, options, &mut report, &mut StderrWarnings)?;
    write_report(&report, output)?;

    log::info!("{snapshots} snapshots from {} to {}", options.from, options.to);
    Ok(())
}

fn write_report(report: &[u8], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, report)
            .with_context(|| format!("Failed to write report to {}", path.display()))?,
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(report)?;
            handle.flush()?;
        }
    }
    Ok(())
}

fn build_search_options(
    settings: &Settings,
    hidden: bool,
    no_ignore: bool,
    max_file_size: Option<u64>,
) -> code_taxonomy::SearchOptions {
    let mut search = settings.search_options();
    search.hidden |= hidden;
    search.respect_gitignore &= !no_ignore;
    search.max_file_size = max_file_size.or(search.max_file_size);
    search
}

/// Warnings go to stderr, never into the report.
struct StderrWarnings;

impl WarningSink for StderrWarnings {
    fn warn(&mut self, warning: ScanWarning) {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
