use crate::error::AppError;
use crate::flows::client::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::scan::orchestrator::FallbackPolicy;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

pub const ENV_PREFIX: &str = "FARM_ASSISTANT";
pub const DEFAULT_CONFIG_FILE: &str = "farm-assistant";
pub const API_KEY_VARIABLE: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub log_level: String,
    pub classifiers: ClassifierSettings,
    pub storage: StorageSettings,
    pub camera: CameraSettings,
    pub assistant: AssistantSettings,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            classifiers: ClassifierSettings::default(),
            storage: StorageSettings::default(),
            camera: CameraSettings::default(),
            assistant: AssistantSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Plant disease prediction endpoint.
    pub plant_url: String,
    /// Thermal analysis endpoint.
    pub thermal_url: String,
    /// Multipart field the image is uploaded under.
    pub upload_field: String,
    pub timeout_secs: u64,
    pub fallback: FallbackPolicy,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            plant_url: "http://127.0.0.1:8000/predict".to_string(),
            thermal_url: "http://127.0.0.1:8001/predict".to_string(),
            upload_field: "file".to_string(),
            timeout_secs: 20,
            fallback: FallbackPolicy::default(),
        }
    }
}

impl ClassifierSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub image_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("scans"),
        }
    }
}

/// Directory the capture device drops snapshots into.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub snapshot_dir: PathBuf,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("camera"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    /// JSON file with the `tasks` and `analyticsData` handed to the assistant.
    pub records_file: Option<PathBuf>,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
            records_file: None,
        }
    }
}

impl AssistantSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Configuration {
    /// Loads defaults, then the TOML file, then `FARM_ASSISTANT__*` variables.
    ///
    /// An explicit path must exist; otherwise `farm-assistant.toml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let environment = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true);
        let mut configuration = Self::load_with(path, environment)?;
        configuration.apply_api_key_fallback(std::env::var(API_KEY_VARIABLE).ok());
        Ok(configuration)
    }

    fn load_with(path: Option<&Path>, environment: Environment) -> Result<Self, AppError> {
        let file = match path {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE)
                .format(FileFormat::Toml)
                .required(false),
        };
        let configuration: Configuration = Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        Ok(configuration)
    }

    fn apply_api_key_fallback(&mut self, fallback: Option<String>) {
        let missing = self
            .assistant
            .api_key
            .as_deref()
            .map_or(true, |key| key.trim().is_empty());
        if missing {
            self.assistant.api_key = fallback.filter(|key| !key.trim().is_empty());
        }
    }

    pub fn tracing_level(&self) -> Result<Level, AppError> {
        self.log_level.parse::<Level>().map_err(|_| {
            AppError::InvalidConfiguration(format!("Unknown log level '{}'", self.log_level))
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.log_level.parse::<Level>().is_err() {
            return Err(format!(
                "Log level must be one of trace, debug, info, warn or error, got '{}'",
                self.log_level
            ));
        }

        for (name, url) in [
            ("Plant classifier", &self.classifiers.plant_url),
            ("Thermal classifier", &self.classifiers.thermal_url),
            ("Assistant endpoint", &self.assistant.endpoint),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("{} URL must be http or https, got '{}'", name, url));
            }
        }

        if self.classifiers.upload_field.trim().is_empty() {
            return Err("Upload field name must not be empty".to_string());
        }

        if self.classifiers.timeout_secs == 0 {
            return Err("Classifier timeout must be greater than 0".to_string());
        }

        if self.assistant.timeout_secs == 0 {
            return Err("Assistant timeout must be greater than 0".to_string());
        }

        if self.assistant.model.trim().is_empty() {
            return Err("Assistant model must not be empty".to_string());
        }

        Ok(())
    }
}
