use crate::collector::{FormatDetector, OutputCollector};
use crate::config::Config;
use crate::error::{ErrorKind, Result};
use crate::job::observer::{JobObserver, NoopObserver};
use crate::job::outcome::JobOutcome;
use crate::job::workspace::Workspace;
use crate::manifest::ManifestBuilder;
use crate::request::{InputValidator, RawRequest};
use crate::runner::{CancelToken, DatasetRoot, ProcessRunner, ToolInvocation};
use std::fmt;
use std::sync::Arc;

/// Stages of one job. `Failed` is reachable from every working stage,
/// `Succeeded` only from `Reporting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Validating,
    Running,
    Collecting,
    Reporting,
    Succeeded,
    Failed(ErrorKind),
}

impl JobStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Succeeded | JobStage::Failed(_))
    }

    pub fn can_transition_to(&self, next: JobStage) -> bool {
        match (self, next) {
            (JobStage::Validating, JobStage::Running)
            | (JobStage::Running, JobStage::Collecting)
            | (JobStage::Collecting, JobStage::Reporting)
            | (JobStage::Reporting, JobStage::Succeeded) => true,
            (current, JobStage::Failed(_)) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStage::Validating => f.write_str("validating"),
            JobStage::Running => f.write_str("running"),
            JobStage::Collecting => f.write_str("collecting"),
            JobStage::Reporting => f.write_str("reporting"),
            JobStage::Succeeded => f.write_str("succeeded"),
            JobStage::Failed(kind) => write!(f, "failed ({})", kind),
        }
    }
}

/// Runs one extraction job end to end: validate, run the tool, collect its
/// outputs, build the manifest.
///
/// Every failure becomes a [`JobOutcome::Failure`]; logs captured before the
/// failure travel with it. A non-zero tool exit is not a failure here.
pub struct JobHandler {
    validator: InputValidator,
    runner: ProcessRunner,
    collector: OutputCollector,
    manifest_builder: ManifestBuilder,
    dataset_root: DatasetRoot,
    observer: Arc<dyn JobObserver>,
}

struct StageTracker<'a> {
    current: JobStage,
    observer: &'a dyn JobObserver,
}

impl<'a> StageTracker<'a> {
    fn start(observer: &'a dyn JobObserver) -> Self {
        observer.stage_entered(JobStage::Validating);
        Self {
            current: JobStage::Validating,
            observer,
        }
    }

    fn advance(&mut self, next: JobStage) {
        debug_assert!(
            self.current.can_transition_to(next),
            "illegal job transition {} -> {}",
            self.current,
            next
        );
        self.current = next;
        self.observer.stage_entered(next);
    }
}

impl JobHandler {
    pub fn new(
        runner: ProcessRunner,
        collector: OutputCollector,
        manifest_builder: ManifestBuilder,
        dataset_root: DatasetRoot,
    ) -> Self {
        Self {
            validator: InputValidator::new(),
            runner,
            collector,
            manifest_builder,
            dataset_root,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let runner = ProcessRunner::new(config.tool.executable.clone())
            .with_interpreter(config.tool.interpreter.clone())
            .with_timeout(config.tool_timeout())
            .with_drain_grace(config.drain_grace());
        let collector = OutputCollector::new(FormatDetector::new(&config.formats)?);
        let manifest_builder = ManifestBuilder::new(config.manifest.identity.clone());
        let dataset_root = DatasetRoot::new(config.tool.dataset_root.clone())?;

        Ok(Self::new(runner, collector, manifest_builder, dataset_root))
    }

    pub fn with_observer<O: JobObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    pub fn dataset_root(&self) -> &DatasetRoot {
        &self.dataset_root
    }

    /// Validates `request` and returns the invocation the tool would receive,
    /// without running anything.
    pub fn plan(&self, request: &RawRequest, workspace: &Workspace) -> Result<ToolInvocation> {
        let extraction = self.validator.validate(request)?;
        Ok(ToolInvocation::new(
            &extraction,
            &self.dataset_root,
            workspace.output_dir(),
        ))
    }

    pub async fn handle(
        &self,
        request: &RawRequest,
        workspace: &Workspace,
        cancel: CancelToken,
    ) -> JobOutcome {
        let mut tracker = StageTracker::start(self.observer.as_ref());
        let outcome = self.execute(request, workspace, cancel, &mut tracker).await;

        match outcome {
            JobOutcome::Success { .. } => tracker.advance(JobStage::Succeeded),
            JobOutcome::Failure { kind, .. } => tracker.advance(JobStage::Failed(kind)),
        }
        self.observer.job_finished(&outcome);

        outcome
    }

    async fn execute(
        &self,
        request: &RawRequest,
        workspace: &Workspace,
        cancel: CancelToken,
        tracker: &mut StageTracker<'_>,
    ) -> JobOutcome {
        let invocation = match self.plan(request, workspace) {
            Ok(invocation) => invocation,
            Err(error) => return JobOutcome::failure(error, None),
        };

        tracker.advance(JobStage::Running);
        let run = match self
            .runner
            .run(&invocation, cancel, self.observer.as_ref())
            .await
        {
            Ok(run) => run,
            Err(error) => return JobOutcome::failure(error, None),
        };

        // Collection happens whatever the exit code; a failed run may still
        // have left diagnostic files behind
        tracker.advance(JobStage::Collecting);
        let artifacts = match self.collector.collect(workspace.output_dir()) {
            Ok(artifacts) => artifacts,
            Err(error) => return JobOutcome::failure(error, Some(run)),
        };
        self.observer.artifacts_collected(&artifacts);

        tracker.advance(JobStage::Reporting);
        let manifest = self.manifest_builder.build(&artifacts);

        JobOutcome::Success { manifest, run }
    }
}
