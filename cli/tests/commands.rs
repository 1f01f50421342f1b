use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Config pointing the local snapshot at a temp dir and no hosted store.
fn setup() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = dir.path().join("relay-drive.toml");
    let snapshot_dir = dir.path().join("snapshot");
    std::fs::write(
        &config_path,
        format!("[store]\nlocal_dir = {:?}\n", snapshot_dir.to_str().unwrap()),
    )
    .expect("Failed to write config");
    (dir, config_path)
}

fn drive(config: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("drive-cli").expect("binary builds");
    cmd.env_remove("SUPABASE_URL")
        .env_remove("SUPABASE_ANON_KEY")
        .env("RUST_LOG", "warn")
        .arg("--config")
        .arg(config);
    cmd
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("drive-cli")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("upload").and(predicate::str::contains("fetch-shared")));
}

#[test]
fn mkdir_then_list_shows_folder() {
    let (_dir, config) = setup();

    drive(&config)
        .args(["mkdir", "--name", "Holiday"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created folder Holiday"));

    drive(&config)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Holiday/").and(predicate::str::contains("Used space: 0 B")));
}

#[test]
fn unknown_share_id_fails() {
    let (_dir, config) = setup();

    drive(&config)
        .args(["fetch-shared", "--share-id", "share_missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn empty_file_is_rejected_before_any_network() {
    let (dir, config) = setup();
    let empty = dir.path().join("empty.txt");
    std::fs::write(&empty, b"").unwrap();

    drive(&config)
        .args(["upload", "--file"])
        .arg(&empty)
        .assert()
        .failure()
        .stderr(predicate::str::contains("empty file"));
}
