#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const START: &str = "2000-01-01_00:00:00";
const END: &str = "2000-01-02_00:00:00";

struct Setup {
    dir: TempDir,
}

impl Setup {
    fn new(tool_body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(root.join("preprocessor.sh"), tool_body).unwrap();
        fs::write(root.join("bc_table.txt"), "ta T\n").unwrap();
        fs::create_dir(root.join("jobs")).unwrap();

        let config = format!(
            r#"[tool]
executable = "{tool}"
interpreter = "/bin/sh"
dataset_root = "/data/CanESM2"

[workspace]
base_directory = "{jobs}"

[formats]
default_mime_type = "application/octet-stream"

[formats.extensions]
log = "text/plain"

[[formats.patterns]]
pattern = "^wrfbdy_d[0-9]{{2}}"
mime_type = "application/x-netcdf"

[manifest]
identity = "bc"
format = "json"
"#,
            tool = root.join("preprocessor.sh").display(),
            jobs = root.join("jobs").display(),
        );
        fs::write(root.join("bc-extractor.toml"), config).unwrap();

        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn workdir(&self) -> PathBuf {
        self.path().join("work")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("bc-extractor").unwrap();
        cmd.current_dir(self.path())
            .arg("--config")
            .arg(self.path().join("bc-extractor.toml"));
        cmd
    }

    fn job(&self) -> Command {
        let mut cmd = self.command();
        cmd.args(["--start", START, "--end", END, "--bc-table"])
            .arg(self.path().join("bc_table.txt"))
            .arg("--workdir")
            .arg(self.workdir());
        cmd
    }
}

const WRITES_OUTPUTS: &str = "printf 'netcdf' > \"$5/wrfbdy_d01\"\n\
                              printf 'ok\\n' > \"$5/run.log\"\n\
                              echo finished\n";

#[test]
fn generate_config_writes_sample_file() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("sample.toml");

    Command::cargo_bin("bc-extractor")
        .unwrap()
        .current_dir(dir.path())
        .arg("--generate-config")
        .arg("--config")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated sample configuration file"));

    let content = fs::read_to_string(&target).unwrap();
    assert!(content.contains("[tool]"));
    assert!(content.contains("[manifest]"));
}

#[test]
fn successful_run_writes_metalink_manifest() {
    let setup = Setup::new(WRITES_OUTPUTS);
    let manifest = setup.path().join("bc.meta4");

    setup
        .job()
        .arg("--manifest")
        .arg(&manifest)
        .args(["--manifest-format", "metalink", "--output-format", "json"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("succeeded"));

    let xml = fs::read_to_string(&manifest).unwrap();
    assert!(xml.contains(r#"<file name="run.log">"#));
    assert!(xml.contains(r#"<file name="wrfbdy_d01">"#));
    assert!(xml.contains("<identity>wrfbdy_d01</identity>"));
    assert!(setup.workdir().join("wrfbdy_d01").is_file());
}

#[test]
fn default_workdir_is_derived_from_the_period() {
    let setup = Setup::new(WRITES_OUTPUTS);

    setup
        .command()
        .args(["--start", START, "--end", END, "--bc-table"])
        .arg(setup.path().join("bc_table.txt"))
        .args(["--output-format", "plain"])
        .assert()
        .code(0);

    let expected = setup
        .path()
        .join("jobs")
        .join("bc_2000-01-01_00_00_00_2000-01-02_00_00_00");
    assert!(expected.join("wrfbdy_d01").is_file());
}

#[test]
fn non_zero_tool_exit_uses_its_own_code() {
    let setup = Setup::new("printf 'partial' > \"$5/wrfbdy_d01\"\necho broken >&2\nexit 2\n");

    setup
        .job()
        .args(["--output-format", "json"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("wrfbdy_d01"));
}

#[test]
fn invalid_timestamp_is_rejected_before_allocation() {
    let setup = Setup::new(WRITES_OUTPUTS);

    setup
        .command()
        .args(["--start", "yesterday", "--end", END, "--bc-table"])
        .arg(setup.path().join("bc_table.txt"))
        .arg("--workdir")
        .arg(setup.workdir())
        .assert()
        .code(3);

    assert!(!setup.workdir().exists());
}

#[test]
fn non_empty_workdir_requires_force() {
    let setup = Setup::new(WRITES_OUTPUTS);
    fs::create_dir(setup.workdir()).unwrap();
    fs::write(setup.workdir().join("stale.nc"), "old").unwrap();

    setup.job().assert().code(1);
    assert!(setup.workdir().join("stale.nc").exists());

    setup.job().arg("--force").assert().code(0);
    assert!(!setup.workdir().join("stale.nc").exists());
    assert!(setup.workdir().join("wrfbdy_d01").is_file());
}

#[test]
fn dry_run_shows_invocation_without_running() {
    let setup = Setup::new("touch \"$5/should_not_exist\"\n");

    setup
        .job()
        .args(["--dry-run", "--output-format", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN MODE"))
        .stdout(predicate::str::contains(START))
        .stdout(predicate::str::contains("/data/CanESM2"));

    assert!(!setup.workdir().exists());
}

#[test]
fn missing_config_file_is_an_environment_error() {
    let setup = Setup::new(WRITES_OUTPUTS);

    Command::cargo_bin("bc-extractor")
        .unwrap()
        .current_dir(setup.path())
        .args(["--config", "missing.toml", "--start", START, "--end", END])
        .args(["--bc-table", "bc_table.txt"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing.toml"));
}

const CHATTY_TOOL: &str = "echo TOOL-STDOUT-LINE\n\
                           echo TOOL-STDERR-LINE >&2\n\
                           printf 'netcdf' > \"$5/wrfbdy_d01\"\n";

#[test]
fn tool_logs_are_shown_in_human_and_plain_modes() {
    for format in ["human", "plain"] {
        let setup = Setup::new(CHATTY_TOOL);

        setup
            .job()
            .args(["--output-format", format])
            .assert()
            .code(0)
            .stdout(predicate::str::contains("--- tool stdout ---\nTOOL-STDOUT-LINE"))
            .stdout(predicate::str::contains("--- tool stderr ---\nTOOL-STDERR-LINE"));
    }
}

#[test]
fn tool_logs_of_a_failed_job_go_to_stderr() {
    let setup = Setup::new(
        "echo TOOL-STDOUT-LINE\necho TOOL-STDERR-LINE >&2\nrmdir \"$5\"\n",
    );

    setup
        .job()
        .args(["--output-format", "plain"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("TOOL-STDOUT-LINE"))
        .stderr(predicate::str::contains("TOOL-STDERR-LINE"));
}

#[test]
fn tool_logs_can_be_written_to_files() {
    let setup = Setup::new(CHATTY_TOOL);
    let out = setup.path().join("tool.out");
    let err = setup.path().join("tool.err");

    setup
        .job()
        .arg("--stdout")
        .arg(&out)
        .arg("--stderr")
        .arg(&err)
        .args(["--quiet"])
        .assert()
        .code(0);

    assert_eq!(fs::read_to_string(&out).unwrap(), "TOOL-STDOUT-LINE\n");
    assert_eq!(fs::read_to_string(&err).unwrap(), "TOOL-STDERR-LINE\n");
}
