use bc_extractor::telemetry::{init_tracing, level_for_verbosity};
use bc_extractor::{
    BcExtractor, BcExtractorError, CapturedOutput, Cli, ErrorKind, JobOutcome, OutputFormatter,
    OutputMode, Result, UserFriendlyError, Workspace,
};
use clap::Parser;
use std::fs;
use std::process;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    init_tracing(cli.log_json, level_for_verbosity(cli.verbose, cli.quiet));

    let extractor = match BcExtractor::from_cli(&cli) {
        Ok(extractor) => extractor,
        Err(e) => {
            print_startup_error(&cli, &e);
            return exit_code_for_error(&e);
        }
    };

    let request = cli.to_raw_request();
    let allocator = cli.workspace_allocator(extractor.config());

    // Bad input is reported before any directory is created
    let planned = Workspace::new(allocator.output_directory());
    if let Err(e) = extractor.plan_job(&request, &planned) {
        extractor.handle_error(&e);
        return exit_code_for_error(&e);
    }

    if cli.dry_run {
        return handle_dry_run(&cli, &extractor, &planned);
    }

    let workspace = match allocator.allocate() {
        Ok(workspace) => workspace,
        Err(e) => {
            extractor.handle_error(&e);
            return exit_code_for_error(&e);
        }
    };

    let outcome = match extractor.run_job(&request, &workspace).await {
        Ok(outcome) => outcome,
        Err(e) => {
            extractor.handle_error(&e);
            return exit_code_for_error(&e);
        }
    };

    extractor.output_formatter().print_outcome(&outcome);

    if let Some(output) = outcome.output() {
        if let Err(e) = write_logs(&cli, output) {
            extractor.handle_error(&e);
            return exit_code_for_error(&e);
        }
    }

    if let (Some(path), Some(manifest)) = (cli.manifest.as_ref(), outcome.manifest()) {
        let format = extractor.config().manifest.format;
        if let Err(e) = manifest.write_to(path, format) {
            extractor.handle_error(&e);
            return exit_code_for_error(&e);
        }
        extractor
            .output_formatter()
            .info(&format!("Manifest written to {}", path.display()));
    }

    exit_code_for_outcome(&outcome)
}

/// Copies the captured streams to the files named by `--stdout`/`--stderr`.
fn write_logs(cli: &Cli, output: &CapturedOutput) -> Result<()> {
    if let Some(ref path) = cli.stdout {
        fs::write(path, output.stdout())?;
    }
    if let Some(ref path) = cli.stderr {
        fs::write(path, output.stderr())?;
    }
    Ok(())
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "bc-extractor.toml".to_string());

    match BcExtractor::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!(
                "  bc-extractor --start <TS> --end <TS> --bc-table <FILE> --config {}",
                config_path
            );
            println!("\nSet [tool].executable and [tool].dataset_root for your installation.");
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_dry_run(cli: &Cli, extractor: &BcExtractor, workspace: &Workspace) -> i32 {
    let formatter = extractor.output_formatter();
    let invocation = match extractor.plan_job(&cli.to_raw_request(), workspace) {
        Ok(invocation) => invocation,
        Err(e) => {
            extractor.handle_error(&e);
            return exit_code_for_error(&e);
        }
    };
    let config = extractor.config();

    if formatter.mode() == OutputMode::Json {
        let plan = serde_json::json!({
            "type": "dry_run",
            "executable": config.tool.executable.display().to_string(),
            "interpreter": config
                .tool
                .interpreter
                .as_ref()
                .map(|p| p.display().to_string()),
            "arguments": invocation
                .to_args()
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect::<Vec<_>>(),
            "workdir": workspace.output_dir().display().to_string(),
            "timeout_secs": config.tool.timeout_secs,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&plan).unwrap_or_else(|_| "{}".to_string())
        );
        return 0;
    }

    println!("DRY RUN MODE - the extraction tool will not be started");
    formatter.print_separator();

    println!("Command that would run:");
    match config.tool.interpreter {
        Some(ref interpreter) => println!(
            "  {} {} {}",
            interpreter.display(),
            config.tool.executable.display(),
            invocation
        ),
        None => println!("  {} {}", config.tool.executable.display(), invocation),
    }
    println!("  Output directory: {}", workspace.output_dir().display());
    match config.tool.timeout_secs {
        Some(secs) => println!("  Timeout: {} seconds", secs),
        None => println!("  Timeout: none"),
    }

    if cli.force {
        formatter.warning("Force mode enabled - a non-empty output directory would be cleared");
    }

    formatter.print_separator();
    formatter.success("Inputs are valid");
    0
}

fn print_startup_error(cli: &Cli, error: &BcExtractorError) {
    let formatter =
        OutputFormatter::new(cli.output_format.into(), cli.verbosity_level(), cli.quiet);
    formatter.print_user_friendly_error(error);
}

fn exit_code_for_kind(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::InvalidInput => 3,
        ErrorKind::ExecutionFailure => 4,
        ErrorKind::OutputCollectionFailure => 5,
        ErrorKind::Cancelled => 130, // Interrupted (SIGINT)
        ErrorKind::Environment => 1,
    }
}

fn exit_code_for_error(error: &BcExtractorError) -> i32 {
    exit_code_for_kind(error.kind())
}

/// A run whose tool exited non-zero still succeeded; the distinct code lets
/// scripts decide how much they trust its outputs.
fn exit_code_for_outcome(outcome: &JobOutcome) -> i32 {
    match outcome {
        JobOutcome::Success { run, .. } if run.exit.success() => 0,
        JobOutcome::Success { .. } => 2,
        JobOutcome::Failure { kind, .. } => exit_code_for_kind(*kind),
    }
}
