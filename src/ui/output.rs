use crate::collector::output_collector::format_bytes;
use crate::collector::Artifact;
use crate::error::{BcExtractorError, UserFriendlyError};
use crate::job::{JobObserver, JobOutcome, JobStage};
use crate::runner::{CapturedOutput, ProcessResult, ToolInvocation};
use crate::ui::progress::format_duration;
use console::{style, Emoji, Term};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn debug(&self, message: &str) {
        if self.should_show_message(2) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("  {}", style(message).dim());
                    } else {
                        println!("  DEBUG: {}", message);
                    }
                }
                OutputMode::Json => self.print_json_message("debug", message),
                OutputMode::Plain => println!("DEBUG: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ROCKET, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &BcExtractorError) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => eprintln!("SUGGESTION: {}", suggestion),
            }
        }
    }

    /// Prints the final result of a job. JSON mode always prints the full
    /// report, including the captured logs.
    pub fn print_outcome(&self, outcome: &JobOutcome) {
        match self.mode {
            OutputMode::Human => self.print_human_outcome(outcome),
            OutputMode::Json => {
                let json_output = serde_json::to_string_pretty(&outcome.report())
                    .unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Plain => self.print_plain_outcome(outcome),
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => println!("{}", "-".repeat(60)),
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        if self.use_colors {
            let styled = match msg_type {
                MessageType::Success => style(message).green().bold(),
                MessageType::Error => style(message).red().bold(),
                MessageType::Warning => style(message).yellow().bold(),
                MessageType::Info => style(message).cyan(),
            };
            let emoji = match msg_type {
                MessageType::Success => &CHECKMARK,
                MessageType::Error => &CROSS,
                MessageType::Warning => &WARNING,
                MessageType::Info => &INFO,
            };

            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, styled),
                _ => println!("{}{}", emoji, styled),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn highlight(&self, value: String) -> String {
        if self.use_colors {
            style(value).cyan().bold().to_string()
        } else {
            value
        }
    }

    fn print_human_outcome(&self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Success { manifest, run } => {
                if self.quiet {
                    return;
                }

                self.print_separator();
                if run.exit.success() {
                    self.success("Boundary condition extraction completed");
                } else {
                    self.warning(&format!(
                        "Extraction tool reported {}; outputs were still collected",
                        run.exit
                    ));
                }

                println!();
                println!("  Tool exit:    {}", self.highlight(run.exit.to_string()));
                println!(
                    "  Time taken:   {}",
                    self.highlight(format_duration(run.duration))
                );
                println!(
                    "  Output files: {}",
                    self.highlight(manifest.len().to_string())
                );

                for entry in &manifest.entries {
                    println!(
                        "    {:<40} {:>10}  {}",
                        entry.name,
                        format_bytes(entry.size),
                        entry.mime_type
                    );
                }
                println!();
                print!("{}", log_sections(&run.output));
                self.print_separator();
            }
            JobOutcome::Failure {
                kind,
                message,
                output,
                exit,
            } => {
                self.error(&format!("Extraction failed ({}): {}", kind, message));
                if let Some(exit) = exit {
                    eprintln!("  Tool exit: {}", exit);
                }

                if let Some(output) = output {
                    eprint!("{}", log_sections(output));
                }
            }
        }
    }

    fn print_plain_outcome(&self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Success { manifest, run } => {
                println!("COMPLETED: Boundary condition extraction");
                println!("Exit: {}", run.exit);
                println!("Duration: {:?}", run.duration);
                println!("Files: {}", manifest.len());
                for entry in &manifest.entries {
                    println!("FILE: {} {} {}", entry.name, entry.size, entry.mime_type);
                }
                print!("{}", log_sections(&run.output));
            }
            JobOutcome::Failure {
                kind,
                message,
                output,
                exit,
            } => {
                eprintln!("FAILED: {}: {}", kind, message);
                if let Some(exit) = exit {
                    eprintln!("Exit: {}", exit);
                }
                if let Some(output) = output {
                    eprint!("{}", log_sections(output));
                }
            }
        }
    }
}

impl JobObserver for OutputFormatter {
    fn stage_entered(&self, stage: JobStage) {
        self.debug(&format!("Job stage: {}", stage));
    }

    fn process_started(&self, invocation: &ToolInvocation, pid: Option<u32>) {
        match pid {
            Some(pid) => self.info(&format!("Started extraction tool (pid {})", pid)),
            None => self.info("Started extraction tool"),
        }
        self.debug(&format!("Arguments: {}", invocation));
    }

    fn process_exited(&self, result: &ProcessResult) {
        self.info(&format!(
            "Extraction tool finished with {} after {}",
            result.exit,
            format_duration(result.duration)
        ));
    }

    fn artifacts_collected(&self, artifacts: &[Artifact]) {
        self.info(&format!("Collected {} output files", artifacts.len()));
    }
}

/// Both captured streams under labelled headers, each ending in a newline.
fn log_sections(output: &CapturedOutput) -> String {
    let mut text = String::new();
    for (label, content) in [("stdout", output.stdout_text()), ("stderr", output.stderr_text())] {
        text.push_str(&format!("--- tool {} ---\n", label));
        if content.is_empty() {
            text.push_str("(empty)\n");
        } else {
            text.push_str(&content);
            if !content.ends_with('\n') {
                text.push('\n');
            }
        }
    }
    text
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}
