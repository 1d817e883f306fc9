use crate::error::{BcExtractorError, ErrorKind};
use crate::manifest::ResultManifest;
use crate::runner::{CapturedOutput, ProcessResult, ToolExit};
use serde::Serialize;

/// The single value a job hands back to its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success {
        manifest: ResultManifest,
        run: ProcessResult,
    },
    Failure {
        kind: ErrorKind,
        message: String,
        /// Whatever the tool had written before the failure, if it ran at all.
        output: Option<CapturedOutput>,
        exit: Option<ToolExit>,
    },
}

impl JobOutcome {
    /// Builds a failure, attaching the logs of `run` or, failing that, the
    /// partial logs the error itself carries.
    pub fn failure(error: BcExtractorError, run: Option<ProcessResult>) -> Self {
        let kind = error.kind();
        let message = error.to_string();
        let exit = run.as_ref().map(|r| r.exit);
        let output = match run {
            Some(run) => Some(run.output),
            None => error.captured_output().cloned(),
        };

        JobOutcome::Failure {
            kind,
            message,
            output,
            exit,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            JobOutcome::Success { .. } => None,
            JobOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn manifest(&self) -> Option<&ResultManifest> {
        match self {
            JobOutcome::Success { manifest, .. } => Some(manifest),
            JobOutcome::Failure { .. } => None,
        }
    }

    pub fn output(&self) -> Option<&CapturedOutput> {
        match self {
            JobOutcome::Success { run, .. } => Some(&run.output),
            JobOutcome::Failure { output, .. } => output.as_ref(),
        }
    }

    pub fn exit(&self) -> Option<ToolExit> {
        match self {
            JobOutcome::Success { run, .. } => Some(run.exit),
            JobOutcome::Failure { exit, .. } => *exit,
        }
    }

    pub fn report(&self) -> OutcomeReport {
        let output = self.output();
        let (status, error_kind, message, duration_ms) = match self {
            JobOutcome::Success { run, .. } => {
                ("succeeded", None, None, Some(run.duration.as_millis() as u64))
            }
            JobOutcome::Failure { kind, message, .. } => {
                ("failed", Some(*kind), Some(message.clone()), None)
            }
        };

        OutcomeReport {
            status: status.to_string(),
            error_kind,
            message,
            exit: self.exit(),
            duration_ms,
            manifest: self.manifest().cloned(),
            stdout: output.map(CapturedOutput::stdout_text).unwrap_or_default(),
            stderr: output.map(CapturedOutput::stderr_text).unwrap_or_default(),
        }
    }
}

/// Serializable view of a [`JobOutcome`] with the logs decoded as text.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeReport {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub exit: Option<ToolExit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub manifest: Option<ResultManifest>,
    pub stdout: String,
    pub stderr: String,
}
