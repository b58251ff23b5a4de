//! Integration tests for coup

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// A coup command sandboxed into a temp directory: cache root, config
    /// and working directory all point inside it
    fn coup_in(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("coup");
        cmd.current_dir(temp.path())
            .env("COUP_USER_DIR", temp.path().join("coup-root"))
            .env("COUP_CONFIG", temp.path().join("no-config.toml"));
        cmd
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("coup")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("package isolation"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("coup")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("coup"));
    }

    #[test]
    fn completions_generate() {
        cargo_bin_cmd!("coup")
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("coup"));
    }

    #[test]
    fn install_without_declaration_fails() {
        let temp = TempDir::new().unwrap();
        coup_in(&temp)
            .args(["install", "--all"])
            .assert()
            .failure()
            .stderr(predicate::str::contains(".hackage"));
    }

    #[test]
    fn missing_explicit_declaration_fails() {
        let temp = TempDir::new().unwrap();
        coup_in(&temp)
            .args(["-p", "absent.hackage", "info"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("does not exist"));
    }

    #[test]
    fn malformed_declaration_fails_with_context() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("proj.hackage"), "text-2.0.2\nnonsense\n").unwrap();

        coup_in(&temp)
            .args(["install", "--all"])
            .assert()
            .failure()
            .stderr(
                predicate::str::contains("Malformed package token")
                    .and(predicate::str::contains("nonsense"))
                    .and(predicate::str::contains(":2")),
            );
    }

    #[test]
    fn multiple_declarations_fail() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.hackage"), "").unwrap();
        std::fs::write(temp.path().join("b.hackage"), "").unwrap();

        coup_in(&temp)
            .args(["install", "--all"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Multiple .hackage declarations"));
    }

    #[test]
    fn pkg_requires_arguments() {
        let temp = TempDir::new().unwrap();
        coup_in(&temp).arg("pkg").assert().failure();
    }

    #[test]
    fn exec_requires_command() {
        let temp = TempDir::new().unwrap();
        coup_in(&temp).arg("exec").assert().failure();
    }

    #[test]
    fn install_all_conflicts_with_packages() {
        let temp = TempDir::new().unwrap();
        coup_in(&temp)
            .args(["install", "--all", "text-2.0.2"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("cannot be used with"));
    }
}
