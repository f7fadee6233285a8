mod cli;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use cli::{ArchiveArgs, Cli, Command};
use colored::Colorize;
use sharesync::archive::ArchiveOptions;
use sharesync::progress::{format_bytes, format_duration};
use sharesync::{
    ArchiveProcessor, ArchiveSummary, ConfigFile, PackageReport, ShareSync, SyncConfig, SyncRequest,
    TransferSummary,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Process exit status of a finished command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Clean,
    Degraded,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            return ExitCode::from(2);
        }
    };

    init_logging(&cli, &config.sync);

    match run(cli, config).await {
        Ok(Status::Clean) => ExitCode::SUCCESS,
        Ok(Status::Degraded) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

fn load_config(cli: &Cli) -> Result<ConfigFile> {
    let mut file = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ConfigFile::default(),
    };

    if let Some(jobs) = cli.jobs {
        file.sync.max_concurrent_transfers = jobs;
    }
    if let Some(retries) = cli.retries {
        file.sync.retry_attempts = retries;
    }
    file.sync.validate()?;
    Ok(file)
}

fn init_logging(cli: &Cli, config: &SyncConfig) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.tracing_level(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, config: ConfigFile) -> Result<Status> {
    let ConfigFile { sync, packages } = config;

    match cli.command {
        Command::Probe { share } => {
            let session = ShareSync::new(share, sync)?;
            let info = session.endpoint().describe();
            println!("{}", serde_json::to_string_pretty(&info)?);
            session.validate_remote().await?;
            println!("{} {}", "✓".green(), session.endpoint().normalized());
            Ok(Status::Clean)
        }

        Command::List {
            share,
            subpath,
            filter,
            json,
        } => {
            let session = ShareSync::new(share, sync)?;
            let spec = filter.to_spec();
            let entries = session
                .list_files(subpath.as_deref(), spec.as_ref(), !json)
                .await?;

            for entry in &entries {
                if json {
                    let modified: DateTime<Local> = entry.modified.into();
                    let line = serde_json::json!({
                        "name": entry.name,
                        "path": entry.path.display().to_string(),
                        "size": entry.size,
                        "modified": modified.to_rfc3339(),
                        "is_dir": entry.is_dir,
                        "permissions": entry.permissions,
                    });
                    println!("{}", line);
                } else if entry.is_dir {
                    let path = entry.path.display().to_string();
                    println!("{:>10}  {}", "<dir>".dimmed(), path.blue());
                } else {
                    println!("{:>10}  {}", format_bytes(entry.size), entry.path.display());
                }
            }
            Ok(Status::Clean)
        }

        Command::Sync {
            share,
            dest,
            filter,
            overwrite,
            keep_destination,
            no_progress,
            process_archives,
            archive,
        } => {
            let session = ShareSync::new(share, sync)?;
            let spec = filter.to_spec();
            let request = SyncRequest {
                overwrite,
                clear_destination: !keep_destination,
                show_progress: !no_progress,
            };
            let options = process_archives.then(|| archive_options(&archive, None));
            let archives_requested = options.is_some();

            let (transfer, archives) = session
                .sync_and_process(&dest, spec.as_ref(), request, options)
                .await?;

            print_transfer(&transfer);
            match &archives {
                Some(archives) => print_archives(archives),
                None if archives_requested => print_archives_missing(),
                None => {}
            }

            let degraded = transfer.is_degraded()
                || match &archives {
                    Some(archives) => archives.is_degraded(),
                    None => archives_requested,
                };
            Ok(status(degraded))
        }

        Command::Process {
            dir,
            output,
            archive,
        } => {
            let options = archive_options(&archive, output);
            let summary = tokio::task::spawn_blocking(move || {
                ArchiveProcessor::new().process_categories(&dir, &options)
            })
            .await??;
            print_archives(&summary);
            Ok(status(summary.is_degraded()))
        }

        Command::Extract {
            dir,
            output,
            keep_archives,
            flat,
        } => {
            let summary = tokio::task::spawn_blocking(move || {
                ArchiveProcessor::new().extract_all(&dir, output.as_deref(), keep_archives, !flat)
            })
            .await??;
            print_archives(&summary);
            Ok(status(summary.is_degraded()))
        }

        Command::Run => {
            anyhow::ensure!(
                !packages.is_empty(),
                "no packages configured (pass --config with a [[packages]] list)"
            );

            let mut degraded = false;
            for package in &packages {
                let report = ShareSync::run_package(package, sync.clone())
                    .await
                    .with_context(|| format!("package {} failed", package.name))?;
                print_package(&report);
                degraded |= report.is_degraded();
            }
            Ok(status(degraded))
        }
    }
}

fn archive_options(args: &ArchiveArgs, output: Option<std::path::PathBuf>) -> ArchiveOptions {
    ArchiveOptions {
        output_dir: output,
        keep_original_archives: args.keep_archives,
        cross_merge: !args.no_cross_merge,
        ..Default::default()
    }
}

fn status(degraded: bool) -> Status {
    if degraded {
        Status::Degraded
    } else {
        Status::Clean
    }
}

fn print_transfer(summary: &TransferSummary) {
    let failed = if summary.failed_files > 0 {
        summary.failed_files.to_string().red().bold()
    } else {
        summary.failed_files.to_string().normal()
    };

    println!("{}", "Transfer summary".bold());
    println!(
        "  files:   {} total, {} ok, {} failed, {} skipped",
        summary.total_files,
        summary.successful_files.to_string().green(),
        failed,
        summary.skipped_files
    );
    println!(
        "  bytes:   {} of {}",
        format_bytes(summary.transferred_bytes),
        format_bytes(summary.total_bytes)
    );
    println!("  elapsed: {}", format_duration(summary.elapsed));
}

fn print_archives_missing() {
    println!("{}", "Archive summary".bold());
    println!(
        "  {}",
        "archive processing failed, nothing extracted".red().bold()
    );
}

fn print_archives(summary: &ArchiveSummary) {
    println!("{}", "Archive summary".bold());
    println!(
        "  archives: {} total, {} processed, {} failed",
        summary.total_archives,
        summary.processed_archives.to_string().green(),
        if summary.failed_archives > 0 {
            summary.failed_archives.to_string().red().bold()
        } else {
            summary.failed_archives.to_string().normal()
        }
    );
    println!("  files:    {}", summary.extracted_files);
    for dir in &summary.output_directories {
        println!("  -> {}", dir.display().to_string().cyan());
    }
    for error in &summary.errors {
        println!("  {} {}", "!".yellow(), error);
    }
    println!("  elapsed:  {}", format_duration(summary.elapsed));
}

fn print_package(report: &PackageReport) {
    println!(
        "{} {} -> {}",
        "Package".bold(),
        report.name.cyan(),
        report.local_path.display()
    );
    print_transfer(&report.transfer);
    match &report.archives {
        Some(archives) => print_archives(archives),
        None if report.archives_requested => print_archives_missing(),
        None => {}
    }
}
