//! hierarchy-curator - Parallel curation walker
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use hierarchy_curator::config::{CliArgs, Command, CurateConfig};
use hierarchy_curator::curator::builtin::{ContainerPath, PrintHierarchy};
use hierarchy_curator::curator::Curator;
use hierarchy_curator::distributor::{Distributor, RunStatus};
use hierarchy_curator::hierarchy::sqlite::FixtureNode;
use hierarchy_curator::hierarchy::{SqliteConnector, SqliteStore, WorkRef};
use hierarchy_curator::progress::{print_header, print_summary, ProgressReporter};
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(RunStatus::Clean) => ExitCode::SUCCESS,
        Ok(RunStatus::WorkersFailed(count)) => {
            warn!(failed_workers = count, "Run finished with failed workers");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<RunStatus> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    if let Some(Command::Import { fixture, output }) = &args.command {
        import(fixture, output)?;
        return Ok(RunStatus::Clean);
    }

    // Validate and create config
    let config = CurateConfig::from_args(&args).context("Invalid configuration")?;
    let (store, root) = args.target().context("Invalid arguments")?;
    let curator = args.curator_name().context("Invalid arguments")?;

    if config.show_progress {
        print_header(
            &store.display().to_string(),
            root,
            curator,
            config.worker_count,
        );
    }

    let connector = SqliteConnector::new(store);
    let root = WorkRef::root(root);
    match curator {
        ContainerPath::NAME => curate(connector, root, ContainerPath::default(), config),
        _ => curate(connector, root, PrintHierarchy, config),
    }
}

/// Run one curation with a concrete curator type
fn curate<C: Curator>(
    connector: SqliteConnector,
    root: WorkRef,
    curator: C,
    config: CurateConfig,
) -> Result<RunStatus> {
    let report_path = config
        .report
        .as_ref()
        .map(|report| report.path.display().to_string());

    // Create progress reporter
    let progress = if config.show_progress {
        Some(ProgressReporter::new())
    } else {
        None
    };

    if let Some(ref p) = progress {
        p.set_status("Curating root...");
    }

    let mut distributor = Distributor::new(connector, config);
    let result = distributor
        .run_with_progress(root, curator, |update| {
            if let Some(ref p) = progress {
                p.update(update);
            }
        })
        .context("Curation failed")?;

    // Finish progress
    if let Some(ref p) = progress {
        if result.failed_workers == 0 {
            p.finish("Curation completed");
        } else {
            p.finish("Curation incomplete");
        }
        print_summary(&result, report_path.as_deref());
    }

    if result.failed > 0 {
        info!(failed = result.failed, "Run completed with node failures");
    }

    Ok(result.status())
}

/// Load a JSON fixture into a new SQLite store
fn import(fixture: &Path, output: &Path) -> Result<()> {
    let tree = FixtureNode::from_file(fixture)
        .with_context(|| format!("Failed to read fixture '{}'", fixture.display()))?;
    let store = SqliteStore::create(output)
        .with_context(|| format!("Failed to create store '{}'", output.display()))?;
    let count = store.import(&tree).context("Import failed")?;
    info!(containers = count, store = %output.display(), "Fixture imported");
    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("hierarchy_curator=debug,warn")
    } else {
        EnvFilter::new("hierarchy_curator=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(verbose)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
