use crate::collector::Artifact;
use crate::job::{JobObserver, JobOutcome, JobStage};
use crate::runner::{ProcessResult, ToolInvocation};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct ProgressManager {
    multi_progress: MultiProgress,
    enabled: bool,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            enabled,
        }
    }

    pub fn create_spinner(&self, message: &str) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = self.multi_progress.add(ProgressBar::new_spinner());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        pb.set_message(message.to_string());
        pb
    }

    /// A spinner that follows one job through its stages.
    pub fn job_observer(&self) -> ProgressObserver {
        ProgressObserver {
            spinner: self.create_spinner("Preparing extraction"),
        }
    }

    /// Wraps `observer` so everything it prints appears with the spinner
    /// hidden.
    pub fn suspended(&self, observer: Arc<dyn JobObserver>) -> SuspendedObserver {
        SuspendedObserver {
            inner: observer,
            progress: self.clone(),
        }
    }

    pub fn suspend<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if self.enabled {
            self.multi_progress.suspend(f)
        } else {
            f()
        }
    }

    pub fn clear(&self) {
        if self.enabled {
            self.multi_progress.clear().ok();
        }
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Spinner shown while the extraction tool runs.
pub struct ProgressObserver {
    spinner: ProgressBar,
}

impl ProgressObserver {
    pub fn message(&self) -> String {
        self.spinner.message()
    }
}

impl JobObserver for ProgressObserver {
    fn stage_entered(&self, stage: JobStage) {
        let message = match stage {
            JobStage::Validating => "Validating request",
            JobStage::Running => "Starting extraction tool",
            JobStage::Collecting => "Collecting outputs",
            JobStage::Reporting => "Building manifest",
            JobStage::Succeeded | JobStage::Failed(_) => return,
        };
        self.spinner.set_message(message);
    }

    fn process_started(&self, _invocation: &ToolInvocation, pid: Option<u32>) {
        match pid {
            Some(pid) => self
                .spinner
                .set_message(format!("Running extraction tool (pid {})", pid)),
            None => self.spinner.set_message("Running extraction tool"),
        }
    }

    fn process_exited(&self, result: &ProcessResult) {
        self.spinner.set_message(format!(
            "Extraction tool finished: {} in {}",
            result.exit,
            format_duration(result.duration)
        ));
    }

    fn artifacts_collected(&self, artifacts: &[Artifact]) {
        self.spinner
            .set_message(format!("Collected {} output files", artifacts.len()));
    }

    fn job_finished(&self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Success { .. } => self.spinner.finish_and_clear(),
            JobOutcome::Failure { kind, .. } => self
                .spinner
                .abandon_with_message(format!("Extraction failed ({})", kind)),
        }
    }
}

/// Forwards job events to an observer that writes to the terminal.
pub struct SuspendedObserver {
    inner: Arc<dyn JobObserver>,
    progress: ProgressManager,
}

impl JobObserver for SuspendedObserver {
    fn stage_entered(&self, stage: JobStage) {
        self.progress.suspend(|| self.inner.stage_entered(stage))
    }

    fn process_started(&self, invocation: &ToolInvocation, pid: Option<u32>) {
        self.progress
            .suspend(|| self.inner.process_started(invocation, pid))
    }

    fn process_exited(&self, result: &ProcessResult) {
        self.progress.suspend(|| self.inner.process_exited(result))
    }

    fn artifacts_collected(&self, artifacts: &[Artifact]) {
        self.progress
            .suspend(|| self.inner.artifacts_collected(artifacts))
    }

    fn job_finished(&self, outcome: &JobOutcome) {
        self.progress.suspend(|| self.inner.job_finished(outcome))
    }
}

pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
