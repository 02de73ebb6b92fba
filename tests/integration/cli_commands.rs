#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    db: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let db = dir.path().join("links.db");
        Self { dir, db }
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("cli.toml")
    }

    fn doublets(&self) -> assert_cmd::Command {
        self.doublets_at(&self.db)
    }

    fn doublets_at(&self, db: &Path) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("doublets");
        cmd.env_remove("DOUBLETS_DB")
            .env_remove("DOUBLETS_CONFIG")
            .arg("--config")
            .arg(self.config())
            .arg("--db")
            .arg(db)
            .args(["--reservation-step", "4096"]);
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        parse_json(self.doublets(), args)
    }

    fn create(&self, source: u64, target: u64) -> u64 {
        let value = self.json(&["create", &source.to_string(), &target.to_string()]);
        value["index"].as_u64().expect("index")
    }
}

fn parse_json(mut cmd: assert_cmd::Command, args: &[&str]) -> Value {
    let output = cmd
        .args(["--format", "json"])
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("valid json")
}

fn stderr_of(mut cmd: assert_cmd::Command, args: &[&str]) -> String {
    let output = cmd.args(args).assert().failure().get_output().stderr.clone();
    String::from_utf8_lossy(&output).into_owned()
}

#[test]
fn create_list_and_count_links() {
    let ws = Workspace::new();
    let empty = ws.json(&["create"]);
    assert_eq!(empty["index"], 1);
    assert_eq!(empty["source"], 0);
    assert_eq!(empty["target"], 0);

    let updated = ws.json(&["update", "1", "1", "1"]);
    assert_eq!(updated["source"], 1);
    assert_eq!(ws.create(1, 1), 2);
    assert_eq!(ws.create(2, 1), 3);

    let listed = ws.json(&["list", "*", "*", "1"]);
    let indices: Vec<u64> = listed
        .as_array()
        .expect("array")
        .iter()
        .map(|link| link["index"].as_u64().expect("index"))
        .collect();
    assert_eq!(indices, vec![1, 2, 3]);

    assert_eq!(ws.json(&["count"])["count"], 3);
    assert_eq!(ws.json(&["count", "*", "1", "1"])["count"], 1);
    assert_eq!(ws.json(&["count", "*", "1", "*"])["count"], 2);
    assert_eq!(ws.json(&["count", "*", "2"])["count"], 1);
    assert_eq!(ws.json(&["count", "*", "1"])["count"], 5);
}

#[test]
fn delete_trims_the_tail_and_reports_missing_links() {
    let ws = Workspace::new();
    ws.json(&["create"]);
    ws.json(&["create"]);
    let deleted = ws.json(&["delete", "2"]);
    assert_eq!(deleted["existed"], true);
    let again = ws.json(&["delete", "2"]);
    assert_eq!(again["existed"], false);

    let stats = ws.json(&["stats"]);
    assert_eq!(stats["total_links"], 1);
    assert_eq!(stats["allocated_links"], 1);
    assert_eq!(stats["free_links"], 0);
    assert_eq!(stats["address_bytes"], 8);
    assert_eq!(stats["link_size_bytes"], 64);
}

#[test]
fn text_output_uses_doublet_notation() {
    let ws = Workspace::new();
    ws.json(&["create"]);
    ws.json(&["update", "1", "1", "1"]);
    ws.doublets()
        .args(["list", "1"])
        .assert()
        .success()
        .stdout("(1: 1 1)\n");
}

#[test]
fn update_of_missing_link_fails() {
    let ws = Workspace::new();
    let stderr = stderr_of(ws.doublets(), &["update", "5", "1", "1"]);
    assert!(stderr.contains("link 5 does not exist"), "stderr: {stderr}");
}

#[test]
fn verify_reports_success_and_damage() {
    let ws = Workspace::new();
    ws.json(&["create"]);
    ws.json(&["update", "1", "1", "1"]);
    ws.create(1, 1);
    let report = ws.json(&["verify"]);
    assert_eq!(report["success"], true);
    assert_eq!(report["counts"]["live_links"], 2);

    // SizeAsTarget of link 2: header record plus two records in, last field.
    let offset = 2 * 64 + 7 * 8;
    let mut bytes = fs::read(&ws.db).expect("read store");
    bytes[offset..offset + 8].copy_from_slice(&9u64.to_le_bytes());
    fs::write(&ws.db, bytes).expect("write store");

    ws.doublets()
        .args(["--format", "json", "verify"])
        .assert()
        .code(2);
}

#[test]
fn logged_changes_replay_into_a_fresh_store() {
    let ws = Workspace::new();
    let log = ws.dir.path().join("links.log");
    let log_arg = log.to_str().expect("utf-8 path");
    ws.doublets()
        .args(["--log", log_arg, "create"])
        .assert()
        .success();
    ws.doublets()
        .args(["--log", log_arg, "update", "1", "1", "1"])
        .assert()
        .success();
    ws.doublets()
        .args(["--log", log_arg, "create", "1", "1"])
        .assert()
        .success();

    let fresh = ws.dir.path().join("replayed.db");
    let replayed = parse_json(ws.doublets_at(&fresh), &["replay", log_arg]);
    assert_eq!(replayed["applied"], 4);
    assert_eq!(
        parse_json(ws.doublets_at(&fresh), &["list"]),
        ws.json(&["list"])
    );
}

#[test]
fn config_supplies_default_store_path() {
    let ws = Workspace::new();
    fs::write(
        ws.config(),
        format!("[database]\ndefault = {:?}\n", ws.db.display().to_string()),
    )
    .expect("write config");
    let output = cargo_bin_cmd!("doublets")
        .env_remove("DOUBLETS_DB")
        .env_remove("DOUBLETS_CONFIG")
        .arg("--config")
        .arg(ws.config())
        .args(["--format", "json", "create"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(value["index"], 1);
    assert!(ws.db.exists());
}

#[test]
fn restriction_values_are_validated() {
    let ws = Workspace::new();
    let stderr = stderr_of(ws.doublets(), &["count", "x"]);
    assert!(stderr.contains("neither a link address nor '*'"), "stderr: {stderr}");
    ws.doublets()
        .args(["count", "1", "2", "3", "4"])
        .assert()
        .failure();
}
