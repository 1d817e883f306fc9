pub mod format_detector;
pub mod output_collector;

pub use format_detector::{FormatDetector, FormatTag};
pub use output_collector::{Artifact, OutputCollector};
