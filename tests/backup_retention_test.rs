use anyhow::Result;
use driversync::backup::BackupManager;
use filetime::{FileTime, set_file_mtime};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn age(path: &Path, days: u64) -> Result<()> {
    let then = SystemTime::now() - Duration::from_secs(days * 86_400);
    set_file_mtime(path, FileTime::from_system_time(then))?;
    Ok(())
}

fn sources(temp: &TempDir) -> Result<(std::path::PathBuf, std::path::PathBuf)> {
    let a = temp.path().join("settings.dat");
    let b = temp.path().join("iracing_reputations.json");
    std::fs::write(&a, r#"{"modules": {}}"#)?;
    std::fs::write(&b, "[]")?;
    Ok((a, b))
}

#[test]
fn test_old_backups_are_pruned_after_new_one() -> Result<()> {
    let temp = TempDir::new()?;
    let (a, b) = sources(&temp)?;
    let folder = temp.path().join("backups");
    std::fs::create_dir_all(&folder)?;

    let old = folder.join("backup_20200101_000000.zip");
    let recent = folder.join("backup_20200102_000000.zip");
    std::fs::write(&old, "old")?;
    std::fs::write(&recent, "recent")?;
    age(&old, 10)?;
    age(&recent, 2)?;

    let manager = BackupManager::new(&folder);
    let created = manager.create_backup(&[a.as_path(), b.as_path()], Some(5))?;

    assert!(created.exists());
    assert!(!old.exists());
    assert!(recent.exists());
    Ok(())
}

#[test]
fn test_unrelated_files_are_never_pruned() -> Result<()> {
    let temp = TempDir::new()?;
    let folder = temp.path().join("backups");
    std::fs::create_dir_all(&folder)?;
    let notes = folder.join("notes.txt");
    std::fs::write(&notes, "keep me")?;
    age(&notes, 100)?;

    let removed = BackupManager::new(&folder).prune_backups(1)?;
    assert!(removed.is_empty());
    assert!(notes.exists());
    Ok(())
}

#[test]
fn test_retention_read_from_config_file() -> Result<()> {
    let temp = TempDir::new()?;
    let (a, b) = sources(&temp)?;
    let folder = temp.path().join("backups");
    std::fs::create_dir_all(&folder)?;
    let config = temp.path().join("config.json");
    std::fs::write(&config, r#"{"backup_retention_days": 1}"#)?;

    let stale = folder.join("backup_20200101_000000.zip");
    std::fs::write(&stale, "stale")?;
    age(&stale, 3)?;

    BackupManager::new(&folder)
        .with_config_path(&config)
        .create_backup(&[a.as_path(), b.as_path()], None)?;
    assert!(!stale.exists());
    Ok(())
}

#[test]
fn test_unreadable_config_falls_back_to_five_days() -> Result<()> {
    let temp = TempDir::new()?;
    let (a, b) = sources(&temp)?;
    let folder = temp.path().join("backups");
    std::fs::create_dir_all(&folder)?;
    let config = temp.path().join("config.json");
    std::fs::write(&config, "not json")?;

    let four_days = folder.join("backup_20200101_000000.zip");
    let six_days = folder.join("backup_20200102_000000.zip");
    std::fs::write(&four_days, "x")?;
    std::fs::write(&six_days, "x")?;
    age(&four_days, 4)?;
    age(&six_days, 6)?;

    BackupManager::new(&folder)
        .with_config_path(&config)
        .create_backup(&[a.as_path(), b.as_path()], None)?;
    assert!(four_days.exists());
    assert!(!six_days.exists());
    Ok(())
}

#[test]
fn test_backups_listed_oldest_first() -> Result<()> {
    let temp = TempDir::new()?;
    let folder = temp.path().join("backups");
    std::fs::create_dir_all(&folder)?;
    let newer = folder.join("backup_20200102_000000.zip");
    let older = folder.join("backup_20200101_000000.zip");
    std::fs::write(&newer, "x")?;
    std::fs::write(&older, "x")?;
    age(&newer, 1)?;
    age(&older, 2)?;

    let listed: Vec<_> = BackupManager::new(&folder)
        .list_backups()?
        .into_iter()
        .map(|entry| entry.path)
        .collect();
    assert_eq!(listed, vec![older, newer]);
    Ok(())
}
