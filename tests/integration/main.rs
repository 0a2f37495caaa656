//! Integration tests for Carryall

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn carryall() -> Command {
        let mut cmd = cargo_bin_cmd!("carryall");
        cmd.env("CI", "1");
        cmd
    }

    /// Command isolated from the user's global and local configuration
    fn isolated(temp: &TempDir) -> Command {
        let mut cmd = carryall();
        cmd.current_dir(temp.path())
            .arg("--no-local")
            .arg("--config")
            .arg(temp.path().join("config.toml"));
        cmd
    }

    #[test]
    fn help_displays() {
        carryall()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("carry build artifacts"));
    }

    #[test]
    fn version_displays() {
        carryall()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("carryall"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[archive]"))
            .stdout(predicate::str::contains("downloads"));
    }

    #[test]
    #[serial]
    fn local_config_is_merged() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(".carryall.toml"),
            "[archive]\ndir = \"vendor/artifacts\"\n",
        )
        .unwrap();
        fs::create_dir_all(temp.path().join("sub")).unwrap();

        carryall()
            .current_dir(temp.path().join("sub"))
            .arg("--config")
            .arg(temp.path().join("config.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("vendor/artifacts"))
            .stdout(predicate::str::contains("linux_amd64"));
    }

    #[test]
    fn completions_generate() {
        carryall()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("carryall"));
    }

    #[test]
    fn clean_missing_dir_is_noop() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["clean", "--dir", "nope"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Nothing to clean"));
    }

    #[test]
    #[serial]
    fn clean_dry_run_then_yes() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("downloads");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("checksum.txt"), "").unwrap();
        fs::write(dir.join("leftover.download"), "partial").unwrap();

        isolated(&temp)
            .args(["clean", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("leftover.download"));
        assert!(dir.join("leftover.download").exists());

        isolated(&temp)
            .args(["clean", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 1 item(s)"));
        assert!(!dir.join("leftover.download").exists());
        assert!(dir.join("checksum.txt").exists());
    }

    #[test]
    #[serial]
    fn save_without_artifacts_writes_ledger() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .env_remove("CARRYALL_IMAGES")
            .env_remove("CARRYALL_WEB_FILES")
            .args(["save", "--dir", "out", "--no-home", "--no-binary"])
            .assert()
            .success();

        let ledger = fs::read_to_string(temp.path().join("out/checksum.txt")).unwrap();
        assert!(ledger.contains("  saveDir.meta"));
        assert_eq!(
            fs::read_to_string(temp.path().join("out/saveDir.meta")).unwrap(),
            "out"
        );
    }

    #[test]
    fn save_rejects_bad_web_file() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["save", "--no-home", "--no-binary", "--web-files", "https://x/a,a,nothex"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid web file specification"));
    }

    #[test]
    fn restore_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["restore", "--source-dir", "missing"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Path not found"));
    }

    #[test]
    fn restore_without_ledger_hints() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("empty")).unwrap();
        isolated(&temp)
            .args(["restore", "--source-dir", "empty"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Checksum ledger not found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn image_vars_requires_registry() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .env("API_IMAGE", "ghcr.io/acme/api:v2")
            .env_remove("CARRYALL_REGISTRY")
            .args(["image-vars", "API_IMAGE"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No registry specified"));
    }

    #[test]
    fn image_vars_prints_exports() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .env("API_IMAGE", "ghcr.io/acme/api:v2")
            .args(["image-vars", "API_IMAGE", "--registry", "registry.airgap:5000"])
            .assert()
            .success()
            .stdout(predicate::eq("export API_IMAGE=registry.airgap:5000/api:v2\n"));
    }

    #[test]
    fn publish_empty_dir_has_nothing_to_do() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("downloads")).unwrap();
        fs::write(temp.path().join("downloads/checksum.txt"), "").unwrap();
        isolated(&temp)
            .args(["publish"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No images to publish"));
    }
}
