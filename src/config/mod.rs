//! Configuration module for the voice session client
//!
//! Configuration comes from .env files, YAML files and environment variables.
//! Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use voice_session::config::VoiceConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = VoiceConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("voice.yaml");
//! let config = VoiceConfig::from_file(&config_path)?;
//!
//! println!("Credentials from {}", config.credential_url);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::{AudioYaml, CredentialYaml, RealtimeYaml, SecurityYaml, YamlConfig};

use crate::core::capture::CaptureOptions;
use crate::core::realtime::openai::{RealtimeVoice, SessionSettings};

/// Voice session configuration
///
/// Contains everything needed to run a session:
/// - Credential backend location and key
/// - Realtime endpoint, model, default voice and persona
/// - Microphone selection and processing flags
/// - Security settings
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    // Credential backend
    pub credential_url: String,
    pub backend_api_key: Option<String>,

    // Realtime service
    pub realtime_url: String,
    pub model: String,
    pub voice: RealtimeVoice,
    pub instructions: Option<String>,
    pub connect_timeout_seconds: u64,

    // Microphone
    pub input_device: Option<String>,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,

    // Security
    pub allow_insecure_endpoints: bool,
}

/// Zeroize the backend key when the configuration is dropped.
impl Drop for VoiceConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.backend_api_key {
            key.zeroize();
        }
    }
}

impl VoiceConfig {
    /// Load configuration from environment variables
    ///
    /// Expects `.env` to have been loaded by the caller (see `main.rs`).
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or the resulting
    /// configuration fails validation.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Session defaults derived from this configuration.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            realtime_url: self.realtime_url.clone(),
            model: self.model.clone(),
            default_voice: self.voice,
            default_instructions: self.instructions.clone(),
            connect_timeout: self.connect_timeout(),
            ..SessionSettings::default()
        }
    }

    /// Microphone options derived from this configuration.
    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            device_name: self.input_device.clone(),
            echo_cancellation: self.echo_cancellation,
            noise_suppression: self.noise_suppression,
            auto_gain_control: self.auto_gain_control,
        }
    }
}
