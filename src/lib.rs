pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod job;
pub mod manifest;
pub mod request;
pub mod runner;
pub mod telemetry;
pub mod ui;
pub mod workspace_allocator;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config, FormatConfig, ManifestConfig, ToolConfig, WorkspaceConfig};
pub use error::{BcExtractorError, ErrorKind, Result, UserFriendlyError};

// Core functionality re-exports
pub use collector::{Artifact, FormatDetector, FormatTag, OutputCollector};
pub use job::{
    JobHandler, JobObserver, JobOutcome, JobStage, NoopObserver, ObserverSet, OutcomeReport,
    TracingObserver, Workspace,
};
pub use manifest::{ManifestBuilder, ManifestEntry, ManifestFormat, ResultManifest};
pub use request::{InputValidator, RawRequest, RawValue, Timestamp};
pub use runner::{
    cancel_pair, CancelHandle, CancelToken, CapturedOutput, DatasetRoot, ProcessResult,
    ProcessRunner, ToolExit, ToolInvocation,
};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};
pub use workspace_allocator::WorkspaceAllocator;

use std::path::Path;
use std::sync::Arc;

/// Command-line host for extraction jobs: configuration, console output,
/// Ctrl+C handling and workspace allocation around a [`JobHandler`].
pub struct BcExtractor {
    config: Config,
    output_formatter: Arc<OutputFormatter>,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
}

impl BcExtractor {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let output_formatter = Arc::new(OutputFormatter::new(output_mode, verbose, quiet));
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);
        let shutdown = GracefulShutdown::new()?;

        Ok(Self {
            config,
            output_formatter,
            progress_manager,
            shutdown,
        })
    }

    /// No signal handler is registered, so several instances may coexist.
    pub fn new_for_test(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        Self {
            config,
            output_formatter: Arc::new(OutputFormatter::new(output_mode, verbose, quiet)),
            progress_manager: ProgressManager::new(false),
            shutdown: GracefulShutdown::new_for_test(),
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        Self::new(
            config,
            cli_args.output_format.into(),
            cli_args.verbose,
            cli_args.quiet,
        )
    }

    /// A handler reporting to the tracing log, the console and the spinner.
    pub fn job_handler(&self) -> Result<JobHandler> {
        let observers = ObserverSet::new()
            .with(TracingObserver)
            .with(self.progress_manager.suspended(self.output_formatter.clone()))
            .with(self.progress_manager.job_observer());

        Ok(JobHandler::from_config(&self.config)?.with_observer(observers))
    }

    /// Runs one job in `workspace`. Ctrl+C cancels the tool.
    pub async fn run_job(&self, request: &RawRequest, workspace: &Workspace) -> Result<JobOutcome> {
        let handler = self.job_handler()?;

        self.output_formatter
            .start_operation("Starting boundary condition extraction");
        let outcome = handler
            .handle(request, workspace, self.shutdown.token())
            .await;
        self.progress_manager.clear();

        Ok(outcome)
    }

    /// Validates `request` and returns the invocation without running it.
    pub fn plan_job(&self, request: &RawRequest, workspace: &Workspace) -> Result<ToolInvocation> {
        JobHandler::from_config(&self.config)?.plan(request, workspace)
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        Config::default().save_to_file(output_path)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    pub fn handle_error(&self, error: &BcExtractorError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}
