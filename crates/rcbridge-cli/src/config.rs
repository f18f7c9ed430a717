//! Bridge configuration – reads/writes `~/.rcbridge/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rcbridge_hal::RaspiStillConfig;
use rcbridge_runtime::SessionConfig;
use rcbridge_types::BridgeError;
use serde::{Deserialize, Serialize};

/// Persisted configuration.  Every field has a default, so a partial file
/// (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP port for the API gateway.
    pub listen_port: u16,
    /// The single origin allowed by the CORS headers.
    pub cors_origin: String,
    pub camera_poll_interval_ms: u64,
    /// Bound on one device frame capture.
    pub capture_timeout_ms: u64,
    /// Pause after enabling the camera at start-up.
    pub camera_warmup_ms: u64,
    /// Start-up head position as a fraction of its travel range.
    pub initial_head_fraction: f32,
    pub still_image_program: String,
    pub still_image_path: PathBuf,
    pub still_image_rotation: u16,
    pub still_image_width: u32,
    pub still_image_height: u32,
    pub still_image_timeout_ms: u64,
    /// Per-topic capacity of the device event bus.
    pub event_bus_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        let still = RaspiStillConfig::default();
        Self {
            listen_port: rcbridge_gateway::DEFAULT_PORT,
            cors_origin: rcbridge_gateway::DEFAULT_CORS_ORIGIN.to_string(),
            camera_poll_interval_ms: 30,
            capture_timeout_ms: 1000,
            camera_warmup_ms: 1000,
            initial_head_fraction: 0.1,
            still_image_program: still.program,
            still_image_path: still.output,
            still_image_rotation: still.rotation,
            still_image_width: still.width,
            still_image_height: still.height,
            still_image_timeout_ms: still.timeout_ms,
            event_bus_capacity: rcbridge_middleware::bus::DEFAULT_CAPACITY,
        }
    }
}

impl Config {
    /// Timing settings for the session.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            camera_poll_interval: Duration::from_millis(self.camera_poll_interval_ms),
            capture_timeout: Duration::from_millis(self.capture_timeout_ms),
            camera_warmup: Duration::from_millis(self.camera_warmup_ms),
            initial_head_fraction: self.initial_head_fraction.clamp(0.0, 1.0),
            color_camera: false,
        }
    }

    /// Settings for the external still camera.
    pub fn still_config(&self) -> RaspiStillConfig {
        RaspiStillConfig {
            program: self.still_image_program.clone(),
            output: self.still_image_path.clone(),
            rotation: self.still_image_rotation,
            width: self.still_image_width,
            height: self.still_image_height,
            timeout_ms: self.still_image_timeout_ms,
        }
    }
}

/// Return the path to `~/.rcbridge/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rcbridge").join("config.toml")
}

/// Load the config from `path`, falling back to defaults when the file does
/// not exist, then apply environment overrides.
pub fn load(path: &Path) -> Result<Config, BridgeError> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config file as written.  Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, BridgeError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        BridgeError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| BridgeError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `RCBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `RCBRIDGE_PORT` | `listen_port` |
/// | `RCBRIDGE_CORS_ORIGIN` | `cors_origin` |
/// | `RCBRIDGE_POLL_INTERVAL_MS` | `camera_poll_interval_ms` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |name| std::env::var(name).ok());
}

fn apply_overrides_from(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("RCBRIDGE_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.listen_port = port;
    }
    if let Some(v) = lookup("RCBRIDGE_CORS_ORIGIN") {
        cfg.cors_origin = v;
    }
    if let Some(v) = lookup("RCBRIDGE_POLL_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.camera_poll_interval_ms = ms;
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), BridgeError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BridgeError::Config(format!("failed to create config directory: {e}"))
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                BridgeError::Config(format!("failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| BridgeError::Config(format!("failed to serialize config: {e}")))?;
    let write_err =
        |e: std::io::Error| BridgeError::Config(format!("failed to write {}: {e}", path.display()));
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}
