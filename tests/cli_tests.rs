//! Black-box CLI smoke tests: invoke the built `bracket15` binary the way
//! an operator would, against a scratch config and database.

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

fn write_config(dir: &std::path::Path) -> std::path::PathBuf {
    let db_path = dir.join("bracket15.sqlite");
    let config_path = dir.join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[database]
path = "{}"
"#,
            db_path.display()
        ),
    )
    .unwrap();
    config_path
}

#[test]
fn help_lists_all_subcommands() {
    Command::cargo_bin("bracket15")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("run"))
        .stdout(contains("status"))
        .stdout(contains("unresolved"))
        .stdout(contains("migrate"));
}

#[test]
fn migrate_then_status_on_a_fresh_database() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    Command::cargo_bin("bracket15").unwrap().args(["--config", config.to_str().unwrap(), "migrate"]).assert().success();

    Command::cargo_bin("bracket15")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "status"])
        .assert()
        .success()
        .stdout(contains("trading enabled"))
        .stdout(contains("false"));
}

#[test]
fn unresolved_reports_clean_on_a_fresh_database() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    Command::cargo_bin("bracket15").unwrap().args(["--config", config.to_str().unwrap(), "migrate"]).assert().success();

    Command::cargo_bin("bracket15")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "unresolved"])
        .assert()
        .success()
        .stdout(contains("no unresolved hedges"));
}

#[test]
fn missing_config_file_exits_nonzero() {
    Command::cargo_bin("bracket15")
        .unwrap()
        .args(["--config", "/no/such/config.toml", "status"])
        .assert()
        .failure();
}
