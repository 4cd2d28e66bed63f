use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn zipwatch(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_zipwatch"))
        .current_dir(cwd)
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to run zipwatch")
}

#[test]
fn test_zip_list_cat_unzip() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("site/css")).unwrap();
    fs::write(root.join("site/index.html"), "<h1>hi</h1>").unwrap();
    fs::write(root.join("site/css/main.css"), "body {}").unwrap();

    let output = zipwatch(root, &["zip", "site", "site.zip"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let output = zipwatch(root, &["list", "site.zip"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        vec!["site/css/main.css", "site/index.html"]
    );

    let output = zipwatch(root, &["cat", "site.zip", "site/index.html"]);
    assert!(output.status.success());
    assert_eq!(output.stdout, b"<h1>hi</h1>");

    let output = zipwatch(root, &["unzip", "site.zip", "out", "--delete"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        fs::read_to_string(root.join("out/site/css/main.css")).unwrap(),
        "body {}"
    );
    assert!(!root.join("site.zip").exists());
}

#[test]
fn test_zip_at_archive_root() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("site")).unwrap();
    fs::write(root.join("site/index.html"), "x").unwrap();

    let output = zipwatch(root, &["zip", "site", "flat.zip", "--root", "archive-root"]);
    assert!(output.status.success());

    let output = zipwatch(root, &["list", "flat.zip"]);
    assert_eq!(String::from_utf8(output.stdout).unwrap().trim(), "index.html");
}

#[test]
fn test_cat_missing_entry_fails() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("site")).unwrap();
    fs::write(root.join("site/index.html"), "x").unwrap();
    assert!(zipwatch(root, &["zip", "site", "site.zip"]).status.success());

    let output = zipwatch(root, &["cat", "site.zip", "site/missing.html"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("site/missing.html"), "{stderr}");
}

#[test]
fn test_config_command_reads_workspace_settings() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join(".zipwatch")).unwrap();
    fs::write(
        root.join(".zipwatch/settings.toml"),
        "[watch]\ndebounce_ms = 250\n",
    )
    .unwrap();

    let output = zipwatch(root, &["config"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("debounce_ms = 250"), "{stdout}");
}

#[test]
fn test_config_flag_overrides_workspace() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(root.join("custom.toml"), "[archive]\ncompression = \"stored\"\n").unwrap();

    let output = zipwatch(root, &["config", "--config", "custom.toml"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("compression = \"stored\""), "{stdout}");
}

#[test]
fn test_watch_exits_on_stdin_eof() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(root.join("a.txt"), "x").unwrap();

    let output = zipwatch(root, &["watch", "a.txt"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn test_watch_missing_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = zipwatch(temp_dir.path(), &["watch", "missing.txt"]);
    assert!(!output.status.success());
}
