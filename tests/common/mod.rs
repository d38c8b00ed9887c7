#![allow(dead_code)]

use anyhow::Result;
use assert_cmd::Command;
use driversync::SyncContext;
use driversync::config::Config;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary iOverlay / CrewChief pair with a configuration and data directory
pub struct Workspace {
    pub temp_dir: TempDir,
    pub overlay: PathBuf,
    pub reputations: PathBuf,
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Workspace {
    /// Create a workspace with the given documents and a configuration
    /// enabling `Friends` and `CrewChief`
    pub fn new(overlay: &Value, reputations: &Value) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let overlay_path = temp_dir.path().join("iOverlay").join("settings.dat");
        let reputations_path = temp_dir
            .path()
            .join("CrewChiefV4")
            .join("iracing_reputations.json");
        std::fs::create_dir_all(overlay_path.parent().unwrap())?;
        std::fs::create_dir_all(reputations_path.parent().unwrap())?;
        std::fs::write(&overlay_path, serde_json::to_vec_pretty(overlay)?)?;
        std::fs::write(&reputations_path, serde_json::to_vec_pretty(reputations)?)?;

        let ws = Self {
            overlay: overlay_path,
            reputations: reputations_path,
            config_path: temp_dir.path().join("config").join("config.json"),
            data_dir: temp_dir.path().join("data"),
            temp_dir,
        };

        let mut config = Config::default();
        config.ioverlay_settings_path = ws.overlay.clone();
        config.crewchief_reputations_path = ws.reputations.clone();
        config.set_category_enabled("Friends", true);
        ws.write_config(&config)?;
        Ok(ws)
    }

    /// Standard documents: no drivers, categories Friends / Slow / CrewChief
    pub fn empty() -> Result<Self> {
        Self::new(&overlay_doc(&json!([])), &json!([]))
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write_config(&self, config: &Config) -> Result<()> {
        config.save(&self.config_path)
    }

    pub fn config(&self) -> Result<Config> {
        Config::load(&self.config_path)
    }

    pub fn context(&self) -> Result<SyncContext> {
        SyncContext::new_explicit(self.config_path.clone(), self.data_dir.clone())
    }

    pub fn read_overlay(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&std::fs::read(&self.overlay)?)?)
    }

    pub fn read_reputations(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&std::fs::read(&self.reputations)?)?)
    }

    /// Raw bytes of both documents
    pub fn snapshot(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        Ok((std::fs::read(&self.overlay)?, std::fs::read(&self.reputations)?))
    }

    /// The driversync binary pointed at this workspace
    pub fn cmd(&self) -> Result<Command> {
        let mut cmd = Command::cargo_bin("driversync")?;
        cmd.env("DRIVERSYNC_CONFIG_PATH", &self.config_path)
            .env("DRIVERSYNC_DATA_DIR", &self.data_dir)
            .env_remove("DRIVERSYNC_LOG")
            .env("NO_COLOR", "1");
        Ok(cmd)
    }
}

/// The standard category list
pub fn categories() -> Value {
    json!([
        {"id": 1, "name": "Friends", "color": "#0000FF"},
        {"id": 2, "name": "Slow", "color": "#AAAAAA"},
        {"id": 3, "name": "CrewChief", "color": "#00FF00"}
    ])
}

/// An iOverlay document with the standard categories and `drivers`
pub fn overlay_doc(drivers: &Value) -> Value {
    overlay_with(&categories(), drivers)
}

/// An iOverlay document with unrelated settings around the tagging module
pub fn overlay_with(categories: &Value, drivers: &Value) -> Value {
    json!({
        "general": {"theme": "dark", "opacity": 0.8},
        "modules": {
            "relative": {"enabled": true},
            "drivertagging": {
                "enabled": true,
                "tagcategory": categories,
                "drivertag": drivers
            }
        }
    })
}

/// A driver tag
pub fn tag(id: i64, identifier: &str, name: &str, tag_id: i64) -> Value {
    json!({"id": id, "identifier": identifier, "name": name, "tagId": tag_id})
}

/// A CrewChief record
pub fn record(customer_id: u64, name: &str) -> Value {
    json!({"customer_id": customer_id, "name": name, "date": "2024-01-01", "carClass": "", "comment": ""})
}

/// Identifiers of the drivertag list
pub fn overlay_identifiers(doc: &Value) -> Vec<String> {
    doc["modules"]["drivertagging"]["drivertag"]
        .as_array()
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t["identifier"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Customer ids of a reputations list, as strings
pub fn crewchief_ids(doc: &Value) -> Vec<String> {
    doc.as_array()
        .map(|records| {
            records
                .iter()
                .map(|r| match &r["customer_id"] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}
