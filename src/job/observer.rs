use crate::collector::Artifact;
use crate::job::handler::JobStage;
use crate::job::outcome::JobOutcome;
use crate::runner::{ProcessResult, ToolInvocation};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Receives progress notifications from a running job.
///
/// Every hook has an empty default so sinks implement only what they need.
pub trait JobObserver: Send + Sync {
    fn stage_entered(&self, _stage: JobStage) {}

    fn process_started(&self, _invocation: &ToolInvocation, _pid: Option<u32>) {}

    fn process_exited(&self, _result: &ProcessResult) {}

    fn artifacts_collected(&self, _artifacts: &[Artifact]) {}

    fn job_finished(&self, _outcome: &JobOutcome) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl JobObserver for NoopObserver {}

impl<T: JobObserver + ?Sized> JobObserver for Arc<T> {
    fn stage_entered(&self, stage: JobStage) {
        (**self).stage_entered(stage)
    }

    fn process_started(&self, invocation: &ToolInvocation, pid: Option<u32>) {
        (**self).process_started(invocation, pid)
    }

    fn process_exited(&self, result: &ProcessResult) {
        (**self).process_exited(result)
    }

    fn artifacts_collected(&self, artifacts: &[Artifact]) {
        (**self).artifacts_collected(artifacts)
    }

    fn job_finished(&self, outcome: &JobOutcome) {
        (**self).job_finished(outcome)
    }
}

/// Forwards every notification to each member in insertion order.
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn JobObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<O: JobObserver + 'static>(mut self, observer: O) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl JobObserver for ObserverSet {
    fn stage_entered(&self, stage: JobStage) {
        self.observers.iter().for_each(|o| o.stage_entered(stage));
    }

    fn process_started(&self, invocation: &ToolInvocation, pid: Option<u32>) {
        self.observers
            .iter()
            .for_each(|o| o.process_started(invocation, pid));
    }

    fn process_exited(&self, result: &ProcessResult) {
        self.observers.iter().for_each(|o| o.process_exited(result));
    }

    fn artifacts_collected(&self, artifacts: &[Artifact]) {
        self.observers
            .iter()
            .for_each(|o| o.artifacts_collected(artifacts));
    }

    fn job_finished(&self, outcome: &JobOutcome) {
        self.observers.iter().for_each(|o| o.job_finished(outcome));
    }
}

/// Emits job events as structured `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl JobObserver for TracingObserver {
    fn stage_entered(&self, stage: JobStage) {
        debug!(stage = %stage, "job stage entered");
    }

    fn process_started(&self, invocation: &ToolInvocation, pid: Option<u32>) {
        info!(pid = ?pid, args = %invocation, "extraction tool started");
    }

    fn process_exited(&self, result: &ProcessResult) {
        let stdout_bytes = result.output.stdout().len();
        let stderr_bytes = result.output.stderr().len();
        let duration_ms = result.duration.as_millis() as u64;

        if result.exit.success() {
            info!(exit = %result.exit, stdout_bytes, stderr_bytes, duration_ms, "extraction tool exited");
        } else {
            warn!(exit = %result.exit, stdout_bytes, stderr_bytes, duration_ms, "extraction tool exited unsuccessfully");
        }
    }

    fn artifacts_collected(&self, artifacts: &[Artifact]) {
        info!(count = artifacts.len(), "output artifacts collected");
        for artifact in artifacts {
            debug!(name = %artifact.name, format = %artifact.format, size = artifact.size, "artifact");
        }
    }

    fn job_finished(&self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Success { manifest, .. } => {
                info!(artifacts = manifest.len(), "job succeeded");
            }
            JobOutcome::Failure { kind, message, .. } => {
                warn!(kind = %kind, message = %message, "job failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<JobStage>>,
    }

    impl JobObserver for Recorder {
        fn stage_entered(&self, stage: JobStage) {
            self.stages.lock().unwrap().push(stage);
        }
    }

    #[test]
    fn test_observer_set_fans_out() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let set = ObserverSet::new()
            .with(first.clone())
            .with(second.clone())
            .with(NoopObserver)
            .with(TracingObserver);

        set.stage_entered(JobStage::Validating);
        set.stage_entered(JobStage::Running);

        assert_eq!(set.len(), 4);
        assert_eq!(*first.stages.lock().unwrap(), vec![JobStage::Validating, JobStage::Running]);
        assert_eq!(*second.stages.lock().unwrap(), vec![JobStage::Validating, JobStage::Running]);
    }
}
