pub mod handler;
pub mod observer;
pub mod outcome;
pub mod workspace;

pub use handler::{JobHandler, JobStage};
pub use observer::{JobObserver, NoopObserver, ObserverSet, TracingObserver};
pub use outcome::{JobOutcome, OutcomeReport};
pub use workspace::Workspace;
