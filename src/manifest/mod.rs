pub mod builder;
pub mod metalink;

pub use builder::{ManifestBuilder, ManifestEntry, ManifestFormat, ResultManifest};
