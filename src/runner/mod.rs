pub mod cancel;
pub mod invocation;
pub mod process_runner;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use invocation::{DatasetRoot, ToolInvocation};
pub use process_runner::{CapturedOutput, ProcessResult, ProcessRunner, ToolExit};
