mod common;

use anyhow::Result;
use assert_cmd::Command;
use common::{Workspace, crewchief_ids, overlay_doc, overlay_identifiers, record, tag};
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn bare_cmd(temp: &TempDir) -> Result<Command> {
    let mut cmd = Command::cargo_bin("driversync")?;
    cmd.env("DRIVERSYNC_CONFIG_PATH", temp.path().join("config.json"))
        .env("DRIVERSYNC_DATA_DIR", temp.path().join("data"))
        .env("NO_COLOR", "1");
    Ok(cmd)
}

fn backup_count(ws: &Workspace) -> usize {
    std::fs::read_dir(ws.data_dir.join("backups"))
        .map(|entries| entries.flatten().count())
        .unwrap_or(0)
}

#[test]
fn test_sync_without_config_fails() -> Result<()> {
    let temp = TempDir::new()?;
    bare_cmd(&temp)?
        .arg("sync")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("driversync init"));
    Ok(())
}

#[test]
fn test_config_missing_source_path_fails() -> Result<()> {
    let ws = Workspace::new(&overlay_doc(&json!([tag(1, "123456", "Alice", 1)])), &json!([]))?;
    let original = serde_json::to_string(&json!({
        "crewchief_reputations_path": ws.reputations,
        "enabled_categories": {"Friends": true}
    }))?;
    std::fs::write(&ws.config_path, &original)?;
    let before = ws.snapshot()?;

    ws.cmd()?
        .arg("sync")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"))
        .stderr(predicate::str::contains("ioverlay_settings_path"));

    assert_eq!(std::fs::read_to_string(&ws.config_path)?, original);
    assert_eq!(ws.snapshot()?, before);
    assert_eq!(backup_count(&ws), 0);
    Ok(())
}

#[test]
fn test_init_creates_config_once() -> Result<()> {
    let temp = TempDir::new()?;
    let overlay = temp.path().join("settings.dat");

    bare_cmd(&temp)?
        .args(["init", "--ioverlay"])
        .arg(&overlay)
        .arg("--crewchief")
        .arg(temp.path().join("iracing_reputations.json"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Created configuration"));

    let config: serde_json::Value =
        serde_json::from_slice(&std::fs::read(temp.path().join("config.json"))?)?;
    assert_eq!(config["ioverlay_settings_path"], overlay.display().to_string());
    assert_eq!(config["enabled_categories"]["CrewChief"], true);
    assert_eq!(config["sync_behavior"], "Additive Only");
    assert!(temp.path().join("data").join("backups").is_dir());

    bare_cmd(&temp)?
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    bare_cmd(&temp)?.args(["init", "--force"]).assert().success();
    Ok(())
}

#[test]
fn test_preview_lists_plan_without_writing() -> Result<()> {
    let ws = Workspace::new(
        &overlay_doc(&json!([tag(1, "123456", "Alice", 1)])),
        &json!([record(789_012, "Bob")]),
    )?;
    let before = ws.snapshot()?;

    ws.cmd()?
        .args(["sync", "--preview"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Planned changes:"))
        .stdout(predicate::str::contains("Add driver 'Bob' to iOverlay"))
        .stdout(predicate::str::contains("Add driver 'Alice' to CrewChief"));

    assert_eq!(ws.snapshot()?, before);
    assert_eq!(backup_count(&ws), 0);
    Ok(())
}

#[test]
fn test_sync_writes_backs_up_and_reports() -> Result<()> {
    let ws = Workspace::new(
        &overlay_doc(&json!([tag(1, "123456", "Alice", 1)])),
        &json!([record(789_012, "Bob")]),
    )?;

    ws.cmd()?
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("Drivers added to iOverlay: 1"))
        .stdout(predicate::str::contains("Drivers added to CrewChief: 1"));

    assert_eq!(overlay_identifiers(&ws.read_overlay()?), vec!["123456", "789012"]);
    assert_eq!(crewchief_ids(&ws.read_reputations()?), vec!["789012", "123456"]);
    assert_eq!(backup_count(&ws), 1);
    assert!(ws.data_dir.join("analytics.json").exists());
    assert!(ws.data_dir.join("logs").join("driversync.log").exists());
    Ok(())
}

#[test]
fn test_sync_without_backup_when_disabled() -> Result<()> {
    let ws = Workspace::new(&overlay_doc(&json!([tag(1, "123456", "Alice", 1)])), &json!([]))?;
    ws.cmd()?
        .args(["config", "backup_files", "false"])
        .assert()
        .success();

    ws.cmd()?.arg("sync").assert().success();
    assert_eq!(backup_count(&ws), 0);
    Ok(())
}

#[test]
fn test_no_categories_enabled_exits_with_warning() -> Result<()> {
    let ws = Workspace::new(&overlay_doc(&json!([tag(1, "123456", "Alice", 1)])), &json!([]))?;
    ws.cmd()?.args(["categories", "disable", "Friends"]).assert().success();
    ws.cmd()?.args(["categories", "disable", "CrewChief"]).assert().success();
    let before = ws.snapshot()?;

    ws.cmd()?
        .arg("sync")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Warning:"))
        .stderr(predicate::str::contains("No iOverlay categories are selected"));

    assert_eq!(ws.snapshot()?, before);
    Ok(())
}

#[test]
fn test_no_categories_enabled_creates_nothing() -> Result<()> {
    let ws = Workspace::new(&overlay_doc(&json!([tag(1, "123456", "Alice", 1)])), &json!([]))?;
    std::fs::remove_file(&ws.reputations)?;
    let mut config = ws.config()?;
    config.set_category_enabled("Friends", false);
    config.set_category_enabled("CrewChief", false);
    ws.write_config(&config)?;

    for args in [vec!["sync"], vec!["sync", "--preview"]] {
        ws.cmd()?.args(&args).assert().failure().code(2);
    }

    assert!(!ws.reputations.exists());
    assert_eq!(backup_count(&ws), 0);
    Ok(())
}

#[test]
fn test_malformed_overlay_fails_sync() -> Result<()> {
    let ws = Workspace::new(&json!({"modules": {}}), &json!([]))?;
    ws.cmd()?
        .arg("sync")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Synchronization failed"));
    Ok(())
}

#[test]
fn test_missing_overlay_fails_before_sync() -> Result<()> {
    let ws = Workspace::empty()?;
    std::fs::remove_file(&ws.overlay)?;
    ws.cmd()?
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("settings.dat not found"));
    Ok(())
}

#[test]
fn test_backup_and_list() -> Result<()> {
    let ws = Workspace::empty()?;
    ws.cmd()?
        .arg("backup")
        .assert()
        .success()
        .stderr(predicate::str::contains("Backup created successfully"));
    assert_eq!(backup_count(&ws), 1);

    ws.cmd()?
        .args(["backup", "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("backup_"));
    Ok(())
}

#[test]
fn test_export_then_import_adds_only_new_drivers() -> Result<()> {
    let ws = Workspace::new(&overlay_doc(&json!([tag(1, "123456", "Alice", 1)])), &json!([]))?;

    ws.cmd()?
        .args(["export", "-"])
        .assert()
        .success()
        .stdout(predicate::str::contains("identifier,name,tagId"))
        .stdout(predicate::str::contains("123456,Alice,1"));

    let csv = ws.path().join("drivers.csv");
    std::fs::write(&csv, "identifier,name,tagId\n123456,Alice Again,2\n234567,Bob,2\n")?;
    let before = ws.snapshot()?;

    ws.cmd()?
        .args(["import", "--preview"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("234567"));
    assert_eq!(ws.snapshot()?, before);
    assert_eq!(backup_count(&ws), 0);

    ws.cmd()?
        .arg("import")
        .arg(&csv)
        .assert()
        .success()
        .stderr(predicate::str::contains("Imported 1 driver(s)"));

    let overlay = ws.read_overlay()?;
    assert_eq!(overlay_identifiers(&overlay), vec!["123456", "234567"]);
    assert_eq!(overlay["modules"]["drivertagging"]["drivertag"][0]["name"], "Alice");
    assert_eq!(overlay["general"]["theme"], "dark");
    assert_eq!(ws.snapshot()?.1, before.1);
    assert_eq!(backup_count(&ws), 1);
    Ok(())
}

#[test]
fn test_import_rejects_malformed_csv() -> Result<()> {
    let ws = Workspace::empty()?;
    let csv = ws.path().join("drivers.csv");
    std::fs::write(&csv, "identifier,name,tagId\nnot-a-number,Eve,1\n")?;
    let before = ws.snapshot()?;

    ws.cmd()?
        .arg("import")
        .arg(&csv)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("line 2"))
        .stderr(predicate::str::contains("nothing was imported"));
    assert_eq!(ws.snapshot()?, before);
    Ok(())
}

#[test]
fn test_categories_list_and_enable() -> Result<()> {
    let ws = Workspace::new(
        &overlay_doc(&json!([tag(1, "123456", "Alice", 1), tag(2, "234567", "Sam", 2)])),
        &json!([]),
    )?;

    ws.cmd()?
        .arg("categories")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"Friends\s+#0000FF\s+1\s+yes")?)
        .stdout(predicate::str::is_match(r"Slow\s+#AAAAAA\s+1\s+no")?);

    ws.cmd()?
        .args(["categories", "enable", "Slow"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Enabled category 'Slow'"));
    assert!(ws.config()?.is_category_enabled("Slow"));

    ws.cmd()?
        .args(["categories", "enable", "slow"])
        .assert()
        .success()
        .stderr(predicate::str::contains("does not exist in iOverlay"));
    Ok(())
}

#[test]
fn test_config_get_set_and_validation() -> Result<()> {
    let ws = Workspace::empty()?;

    ws.cmd()?
        .args(["config", "backup_retention_days", "40"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 1 and 30"));

    ws.cmd()?
        .args(["config", "backup_retention_days", "10"])
        .assert()
        .success();
    ws.cmd()?
        .args(["config", "backup_retention_days"])
        .assert()
        .success()
        .stdout("10\n");

    ws.cmd()?
        .args(["config", "sync_behavior", "Bidirectional"])
        .assert()
        .success();
    ws.cmd()?
        .args(["config", "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sync_behavior = Bidirectional"))
        .stdout(predicate::str::contains("Friends = true"));
    Ok(())
}

#[test]
fn test_analytics_summary_and_reset() -> Result<()> {
    let ws = Workspace::new(&overlay_doc(&json!([tag(1, "123456", "Alice", 1)])), &json!([]))?;

    ws.cmd()?
        .arg("analytics")
        .assert()
        .success()
        .stderr(predicate::str::contains("No analytics data found."));

    ws.cmd()?.arg("sync").assert().success();
    ws.cmd()?
        .arg("analytics")
        .assert()
        .success()
        .stdout(predicate::str::contains("Runs recorded: 1"))
        .stdout(predicate::str::contains("Drivers added to CrewChief: 1"));

    ws.cmd()?.args(["analytics", "--reset"]).assert().success();
    assert!(!ws.data_dir.join("analytics.json").exists());
    Ok(())
}

#[test]
fn test_check_reports_and_fixes_duplicates() -> Result<()> {
    let ws = Workspace::new(
        &overlay_doc(&json!([
            tag(1, "111111", "Dup", 1),
            tag(2, "111111", "Dup again", 1)
        ])),
        &json!([record(222_222, "Eve"), record(222_222, "Eve again")]),
    )?;

    ws.cmd()?
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Duplicate drivers: 111111"))
        .stdout(predicate::str::contains("Duplicate drivers: 222222"));

    ws.cmd()?
        .args(["check", "--fix-duplicates"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed 1 duplicate(s) from iOverlay and 1 from CrewChief"));

    assert_eq!(overlay_identifiers(&ws.read_overlay()?), vec!["111111"]);
    assert_eq!(crewchief_ids(&ws.read_reputations()?), vec!["222222"]);
    assert_eq!(ws.read_reputations()?[0]["name"], "Eve");
    assert_eq!(backup_count(&ws), 1);
    Ok(())
}

#[test]
fn test_check_fails_on_malformed_source() -> Result<()> {
    let ws = Workspace::new(&overlay_doc(&json!([])), &json!({"not": "a list"}))?;
    ws.cmd()?
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("problem(s)"));
    Ok(())
}

#[test]
fn test_reset_config() -> Result<()> {
    let ws = Workspace::empty()?;
    ws.cmd()?
        .arg("reset-config")
        .assert()
        .success()
        .stderr(predicate::str::contains("Configuration reset successfully"));
    assert!(!ws.config_path.exists());

    ws.cmd()?
        .arg("reset-config")
        .assert()
        .success()
        .stderr(predicate::str::contains("No reset needed"));
    Ok(())
}

#[test]
fn test_run_scheduled_requires_interval() -> Result<()> {
    let ws = Workspace::empty()?;
    ws.cmd()?
        .arg("run-scheduled")
        .assert()
        .failure()
        .stderr(predicate::str::contains("scheduler interval"));

    ws.cmd()?
        .args(["run-scheduled", "--interval", "30"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 1 and 24"));
    Ok(())
}

#[test]
fn test_about_and_version() -> Result<()> {
    let temp = TempDir::new()?;
    bare_cmd(&temp)?
        .arg("about")
        .assert()
        .success()
        .stdout(predicate::str::contains("DriverSync"))
        .stdout(predicate::str::contains(driversync::VERSION));

    bare_cmd(&temp)?
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(driversync::VERSION));
    Ok(())
}

#[test]
fn test_completion_script() -> Result<()> {
    let temp = TempDir::new()?;
    bare_cmd(&temp)?
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("driversync"));
    Ok(())
}
