use crate::input::JoystickGeometry;
use crate::scheduler::SchedulerSettings;
use crate::transport::Endpoint;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/copterlink";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub endpoint: EndpointConfig,
    pub transmission: TransmissionConfig,
    pub joystick: JoystickConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        let endpoint = Endpoint::default();
        Self {
            host: endpoint.host,
            port: endpoint.port,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TransmissionConfig {
    pub period_ms: u64,
    pub send_timeout_ms: u64,
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            period_ms: 100,
            send_timeout_ms: 100,
        }
    }
}

/// Size of one joystick view in pixels
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct JoystickConfig {
    pub view_width: f32,
    pub view_height: f32,
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            view_width: 600.0,
            view_height: 600.0,
        }
    }
}

impl AppConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.endpoint.host.clone(), self.endpoint.port)
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            period: Duration::from_millis(self.transmission.period_ms),
            send_timeout: Duration::from_millis(self.transmission.send_timeout_ms),
        }
    }

    pub fn joystick_geometry(&self) -> JoystickGeometry {
        JoystickGeometry::from_view_size(self.joystick.view_width, self.joystick.view_height)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.host.trim().is_empty() {
            return Err(eyre!("Endpoint host must not be empty"));
        }
        if self.endpoint.port == 0 {
            return Err(eyre!("Endpoint port must not be 0"));
        }
        if self.transmission.period_ms == 0 {
            return Err(eyre!("Transmission period must be greater than 0ms"));
        }
        if self.transmission.send_timeout_ms == 0 {
            return Err(eyre!("Send timeout must be greater than 0ms"));
        }
        let JoystickConfig {
            view_width,
            view_height,
        } = self.joystick;
        if !(view_width.is_finite() && view_height.is_finite())
            || view_width <= 0.0
            || view_height <= 0.0
        {
            return Err(eyre!(
                "Joystick view must have a positive size, got {}x{}",
                view_width,
                view_height
            ));
        }
        Ok(())
    }

    /// Replaces the endpoint parts given on the command line
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.endpoint.host = host;
        }
        if let Some(port) = port {
            self.endpoint.port = port;
        }
        self
    }

    /// Loads the configuration at `path`, creating it with defaults if it is missing
    ///
    /// The result is not validated; call [`AppConfig::validate`] once all overrides
    /// are applied.
    pub async fn load_or_create(path: &Path) -> Result<Self> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?;

        let config = if exists {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
            let config: AppConfig = toml::from_str(&content)
                .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;
            info!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Config file {} does not exist, writing defaults",
                path.display()
            );
            let config = AppConfig::default();
            config.save(path).await?;
            config
        };

        debug!("Loaded config: {:?}", config);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file {}: {}", path.display(), e))?;

        info!("Config saved to {}", path.display());
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    let mut path = get_home_dir();
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    path
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}
