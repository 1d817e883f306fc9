use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::manifest::ManifestFormat;
use crate::request::{RawRequest, BC_TABLE, END_DATETIME, START_DATETIME};
use crate::ui::OutputMode;
use crate::workspace_allocator::WorkspaceAllocator;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bc-extractor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract WRF boundary conditions from a climate dataset")]
#[command(
    long_about = "bc-extractor runs the boundary-condition extraction tool for a time window \
                  and BC table, captures its logs, and lists the files it produced."
)]
#[command(after_help = "EXAMPLES:\n  \
    bc-extractor --start 2000-01-01_00:00:00 --end 2000-01-02_00:00:00 --bc-table table.txt\n  \
    bc-extractor --start 2000-01-01_00:00:00 --end 2000-01-02_00:00:00 --bc-table table.txt \\\n    \
      --workdir /scratch/job-17 --manifest bc.meta4 --manifest-format metalink \\\n    \
      --stdout tool.out --stderr tool.err\n  \
    bc-extractor --generate-config --config bc-extractor.toml")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Start of the extraction window (YYYY-MM-DD_HH:MM:SS)
    #[arg(long, required_unless_present = "generate_config")]
    pub start: Option<String>,

    /// End of the extraction window (YYYY-MM-DD_HH:MM:SS)
    #[arg(long, required_unless_present = "generate_config")]
    pub end: Option<String>,

    /// Boundary-condition table file
    #[arg(long, required_unless_present = "generate_config")]
    pub bc_table: Option<PathBuf>,

    /// Output directory for this job (defaults to <base>/bc_<start>_<end>)
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Base directory for generated job directories
    #[arg(long, help = "Where job directories are created when --workdir is not given")]
    pub base_dir: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Write the result manifest to this file
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Manifest document format
    #[arg(long, value_enum)]
    pub manifest_format: Option<ManifestFormat>,

    /// Write the tool's captured standard output to this file
    #[arg(long, value_name = "FILE")]
    pub stdout: Option<PathBuf>,

    /// Write the tool's captured standard error to this file
    #[arg(long, value_name = "FILE")]
    pub stderr: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Kill the tool after this many seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Clear a non-empty output directory before running
    #[arg(long, help = "Clear an existing non-empty output directory")]
    pub force: bool,

    /// Validate inputs and show the tool invocation without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Emit log records as JSON lines on stderr
    #[arg(long)]
    pub log_json: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl From<OutputFormat> for OutputMode {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        }
    }
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_timeout(self.timeout)
            .with_base_directory(self.base_dir.clone())
            .with_manifest_format(self.manifest_format)
    }

    /// The job request exactly as given; validation happens in the job.
    pub fn to_raw_request(&self) -> RawRequest {
        let mut request = RawRequest::new();

        if let Some(ref start) = self.start {
            request = request.with_literal(START_DATETIME, start.clone());
        }
        if let Some(ref end) = self.end {
            request = request.with_literal(END_DATETIME, end.clone());
        }
        if let Some(ref bc_table) = self.bc_table {
            request = request.with_file(BC_TABLE, bc_table.clone());
        }

        request
    }

    pub fn workspace_allocator(&self, config: &Config) -> WorkspaceAllocator {
        let allocator = match self.workdir {
            Some(ref workdir) => WorkspaceAllocator::explicit(workdir.clone()),
            None => WorkspaceAllocator::for_period(
                config.workspace.base_directory.clone(),
                self.start.as_deref().unwrap_or_default(),
                self.end.as_deref().unwrap_or_default(),
            ),
        };

        allocator.with_force_overwrite(self.force)
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RawValue;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["bc-extractor"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_required_request_fields() {
        assert!(Cli::try_parse_from(["bc-extractor", "--start", "x"]).is_err());
        assert!(Cli::try_parse_from(["bc-extractor", "--generate-config"]).is_ok());
    }

    #[test]
    fn test_raw_request_passes_values_through() {
        let cli = parse(&[
            "--start",
            "not-a-date",
            "--end",
            "2000-01-02_00:00:00",
            "--bc-table",
            "table.txt",
        ]);
        let request = cli.to_raw_request();

        assert_eq!(
            request.values(START_DATETIME),
            &[RawValue::Literal("not-a-date".to_string())]
        );
        assert_eq!(
            request.values(BC_TABLE),
            &[RawValue::File(PathBuf::from("table.txt"))]
        );
    }

    #[test]
    fn test_overrides() {
        let cli = parse(&[
            "--start",
            "a",
            "--end",
            "b",
            "--bc-table",
            "t",
            "--timeout",
            "60",
            "--manifest-format",
            "metalink",
        ]);
        let overrides = cli.create_cli_overrides();

        assert_eq!(overrides.timeout, Some(60));
        assert_eq!(overrides.manifest_format, Some(ManifestFormat::Metalink));
        assert!(overrides.base_directory.is_none());
    }

    #[test]
    fn test_log_file_flags() {
        let cli = parse(&[
            "--start",
            "a",
            "--end",
            "b",
            "--bc-table",
            "t",
            "--stdout",
            "tool.out",
            "--stderr",
            "tool.err",
        ]);
        assert_eq!(cli.stdout, Some(PathBuf::from("tool.out")));
        assert_eq!(cli.stderr, Some(PathBuf::from("tool.err")));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Cli::try_parse_from([
            "bc-extractor",
            "--start",
            "a",
            "--end",
            "b",
            "--bc-table",
            "t",
            "--timeout",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from([
            "bc-extractor",
            "--generate-config",
            "-q",
            "-v",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_workdir() {
        let cli = parse(&[
            "--start",
            "a",
            "--end",
            "b",
            "--bc-table",
            "t",
            "--workdir",
            "/scratch/job-17",
        ]);
        let allocator = cli.workspace_allocator(&Config::default());
        assert_eq!(
            allocator.output_directory(),
            std::path::Path::new("/scratch/job-17")
        );
    }
}
