//! `StillCamera` trait and the `raspistill` implementation.
//!
//! A still camera is an auxiliary image source outside the robot: it writes
//! one image to a fixed path on disk, where a separate web server picks it up.
//! It never touches the state store.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use rcbridge_types::BridgeError;
use tokio::process::Command;
use tracing::debug;

/// An external still-image capture utility.
#[async_trait]
pub trait StillCamera: Send + Sync {
    /// Take one picture and return where it was written.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::StillCamera`] when the utility cannot be started
    /// or exits unsuccessfully.
    async fn capture_still(&self) -> Result<PathBuf, BridgeError>;
}

/// Settings for [`RaspiStill`].
#[derive(Debug, Clone, PartialEq)]
pub struct RaspiStillConfig {
    pub program: String,
    pub output: PathBuf,
    pub rotation: u16,
    pub width: u32,
    pub height: u32,
    pub timeout_ms: u64,
}

impl Default for RaspiStillConfig {
    fn default() -> Self {
        Self {
            program: "raspistill".to_string(),
            output: PathBuf::from("/var/www/html/cozmo/camera2.jpg"),
            rotation: 270,
            width: 512,
            height: 360,
            timeout_ms: 300,
        }
    }
}

/// Runs the Raspberry Pi `raspistill` utility.
pub struct RaspiStill {
    config: RaspiStillConfig,
}

impl RaspiStill {
    pub fn new(config: RaspiStillConfig) -> Self {
        Self { config }
    }

    /// Path the utility writes to.
    pub fn output(&self) -> &Path {
        &self.config.output
    }

    /// Command-line arguments passed to the utility.
    pub fn args(&self) -> Vec<String> {
        let c = &self.config;
        vec![
            "-o".to_string(),
            c.output.display().to_string(),
            "-rot".to_string(),
            c.rotation.to_string(),
            "-w".to_string(),
            c.width.to_string(),
            "-h".to_string(),
            c.height.to_string(),
            "-t".to_string(),
            c.timeout_ms.to_string(),
        ]
    }
}

#[async_trait]
impl StillCamera for RaspiStill {
    async fn capture_still(&self) -> Result<PathBuf, BridgeError> {
        debug!(program = %self.config.program, output = %self.config.output.display(), "capturing still");
        let output = Command::new(&self.config.program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                BridgeError::StillCamera(format!("failed to run {}: {e}", self.config.program))
            })?;

        if !output.status.success() {
            return Err(BridgeError::StillCamera(format!(
                "{} exited with {}: {}",
                self.config.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(self.config.output.clone())
    }
}
