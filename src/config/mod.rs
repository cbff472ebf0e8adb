use fs_err as fs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cli::{Args, ProviderKind};
use crate::errors::{GatewayError, GatewayResult};
use crate::wire::ModuleInputs;

/// Run settings, resolved from the command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: String,
    pub config_path: String,
    pub sensors_path: String,
    pub model: Option<String>,
    pub provider: Option<ProviderKind>,
    pub timeout_secs: Option<u64>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub save_artifacts: bool,
    pub progress: bool,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: ".".into(),
            config_path: "config.json".into(),
            sensors_path: "sensors.json".into(),
            model: None,
            provider: None,
            timeout_secs: None,
            max_tokens: 1500,
            temperature: 0.7,
            save_artifacts: true,
            progress: true,
            debug: false,
        }
    }
}

impl Settings {
    pub fn from_args(args: &Args) -> Self {
        Self {
            root: args.root.clone(),
            config_path: args.config.clone(),
            sensors_path: args.sensors.clone(),
            model: args.model.clone(),
            provider: args.provider,
            timeout_secs: args.timeout_secs,
            max_tokens: args.max_tokens,
            temperature: args.temperature,
            save_artifacts: args.save_artifacts,
            progress: args.progress,
            debug: args.debug,
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        Path::new(&self.root).join(".gateway")
    }

    pub fn history_path(&self) -> PathBuf {
        self.state_dir().join("history.json")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelEntry {
    #[serde(default, alias = "credential")]
    pub key: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Persisted gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    #[serde(default)]
    pub boards: Vec<String>,
    #[serde(default)]
    pub technologies: BTreeMap<String, String>,
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardAdded {
    Added,
    AlreadyExists,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let technologies = [
            ("Bluetooth", "Provide BLE Device MAC address and supported services."),
            ("LoRaWAN", "Include frequency band and credentials for the gateway."),
            ("Wi-Fi", "Provide SSID, password, and endpoint URL."),
        ];
        let models = [
            ("gpt-3.5-turbo", "General-purpose ChatGPT model."),
            ("gpt-4", "Advanced ChatGPT model with better reasoning capabilities."),
        ];
        Self {
            boards: vec!["ESP32 Firebeetle".into(), "Heltec LoRa".into(), "Arduino Uno".into()],
            technologies: technologies
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            models: models
                .iter()
                .map(|(name, desc)| {
                    (
                        name.to_string(),
                        ModelEntry {
                            key: String::new(),
                            description: desc.to_string(),
                            provider: ProviderKind::OpenAI,
                            base_url: None,
                        },
                    )
                })
                .collect(),
        }
    }
}

impl GatewayConfig {
    /// Reads the config file, or the built-in defaults when it does not exist.
    pub fn load(path: &Path) -> GatewayResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| GatewayError::Config(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> GatewayResult<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| GatewayError::Config(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn add_board(&mut self, name: &str) -> GatewayResult<BoardAdded> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GatewayError::precondition("Error: No board name entered."));
        }
        if self.boards.iter().any(|b| b == name) {
            return Ok(BoardAdded::AlreadyExists);
        }
        self.boards.push(name.to_string());
        Ok(BoardAdded::Added)
    }

    pub fn technology_details(&self, name: &str) -> Option<&str> {
        self.technologies.get(name.trim()).map(String::as_str)
    }

    pub fn model(&self, name: &str) -> GatewayResult<&ModelEntry> {
        self.models
            .get(name)
            .ok_or_else(|| GatewayError::precondition(format!("Error: Unknown model '{name}'.")))
    }
}

/// One entry of the sensor presets file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorPreset {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technology: String,
    #[serde(default)]
    pub board: String,
    #[serde(default)]
    pub data_format: Value,
}

impl SensorPreset {
    pub fn inputs(&self) -> ModuleInputs {
        ModuleInputs {
            kind: self.kind.clone(),
            description: self.description.clone(),
            technology: self.technology.clone(),
            board: self.board.clone(),
        }
    }

    pub fn data_format_text(&self) -> String {
        match &self.data_format {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            v => serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorPresets {
    #[serde(default)]
    pub sensors: BTreeMap<String, SensorPreset>,
}

impl SensorPresets {
    /// Missing file means no presets.
    pub fn load(path: &Path) -> GatewayResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| GatewayError::Config(format!("{}: {e}", path.display())))
    }

    pub fn get(&self, name: &str) -> Option<&SensorPreset> {
        self.sensors.get(name.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = GatewayConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(cfg.boards[0], "ESP32 Firebeetle");
        assert!(cfg.technology_details("LoRaWAN").unwrap().contains("frequency band"));
        assert!(cfg.models.contains_key("gpt-4"));
    }

    #[test]
    fn reads_original_file_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "boards": ["Heltec LoRa", "ESP32 Firebeetle"],
                "technologies": {"Wi-Fi": "SSID and password"},
                "models": {"gpt-4o": {"key": "sk-test", "description": "fast"},
                           "llama3": {"credential": "", "description": "local", "provider": "ollama"}}
            }"#,
        )
        .unwrap();
        let cfg = GatewayConfig::load(&path).unwrap();
        assert_eq!(cfg.boards, ["Heltec LoRa", "ESP32 Firebeetle"]);
        assert_eq!(cfg.model("gpt-4o").unwrap().key, "sk-test");
        assert_eq!(cfg.model("gpt-4o").unwrap().provider, ProviderKind::OpenAI);
        assert_eq!(cfg.model("llama3").unwrap().provider, ProviderKind::Ollama);
        assert!(cfg.model("missing").unwrap_err().is_precondition());
    }

    #[test]
    fn add_board_persists_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut cfg = GatewayConfig::default();

        assert_eq!(cfg.add_board(" Wireless Stick Lite ").unwrap(), BoardAdded::Added);
        assert_eq!(cfg.add_board("Wireless Stick Lite").unwrap(), BoardAdded::AlreadyExists);
        assert!(cfg.add_board("   ").is_err());
        cfg.save(&path).unwrap();

        let back = GatewayConfig::load(&path).unwrap();
        assert_eq!(back.boards.last().map(String::as_str), Some("Wireless Stick Lite"));
        assert_eq!(back, cfg);
    }

    #[test]
    fn preset_renders_data_format_as_json() {
        let presets: SensorPresets = serde_json::from_str(
            r#"{"sensors": {"ruuvi": {"type": "Ruuvitag", "description": "BLE tag",
                 "technology": "Bluetooth", "board": "ESP32 Firebeetle",
                 "data_format": {"t": "float", "h": "float"}}}}"#,
        )
        .unwrap();
        let p = presets.get("ruuvi").unwrap();
        assert_eq!(p.inputs().kind, "Ruuvitag");
        assert_eq!(p.data_format_text(), "{\n  \"h\": \"float\",\n  \"t\": \"float\"\n}");
        assert!(presets.get("dht22").is_none());
    }
}
