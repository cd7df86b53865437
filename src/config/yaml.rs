use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// credential:
///   url: "https://backend.example.com/api/session"
///   api_key: "backend-key"
///
/// realtime:
///   url: "wss://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview-2024-12-17"
///   voice: "verse"
///   instructions: "You are a friendly assistant."
///   connect_timeout_seconds: 10
///
/// audio:
///   input_device: "MacBook Pro Microphone"
///   echo_cancellation: true
///   noise_suppression: true
///   auto_gain_control: true
///
/// security:
///   allow_insecure_endpoints: false
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub credential: Option<CredentialYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub audio: Option<AudioYaml>,
    pub security: Option<SecurityYaml>,
}

/// Credential backend configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CredentialYaml {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

/// Realtime session configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub instructions: Option<String>,
    pub connect_timeout_seconds: Option<u64>,
}

/// Audio device configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    pub input_device: Option<String>,
    pub echo_cancellation: Option<bool>,
    pub noise_suppression: Option<bool>,
    pub auto_gain_control: Option<bool>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// Accept `http`/`ws` schemes and private hosts (local development only)
    pub allow_insecure_endpoints: Option<bool>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
credential:
  url: "https://backend.example.com/api/session"
  api_key: "backend-key"

realtime:
  url: "wss://realtime.example.com/v1/realtime"
  model: "gpt-4o-realtime-preview"
  voice: "verse"
  instructions: "Be terse."
  connect_timeout_seconds: 5

audio:
  input_device: "USB Mic"
  echo_cancellation: false

security:
  allow_insecure_endpoints: true
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let credential = config.credential.unwrap();
        assert_eq!(
            credential.url.as_deref(),
            Some("https://backend.example.com/api/session")
        );
        assert_eq!(credential.api_key.as_deref(), Some("backend-key"));

        let realtime = config.realtime.unwrap();
        assert_eq!(realtime.voice.as_deref(), Some("verse"));
        assert_eq!(realtime.instructions.as_deref(), Some("Be terse."));
        assert_eq!(realtime.connect_timeout_seconds, Some(5));

        let audio = config.audio.unwrap();
        assert_eq!(audio.input_device.as_deref(), Some("USB Mic"));
        assert_eq!(audio.echo_cancellation, Some(false));
        assert_eq!(audio.noise_suppression, None);

        assert_eq!(config.security.unwrap().allow_insecure_endpoints, Some(true));
    }

    #[test]
    fn test_yaml_config_partial() {
        let yaml = r#"
realtime:
  voice: "sage"
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.credential.is_none());
        assert!(config.audio.is_none());
        assert_eq!(config.realtime.unwrap().voice.as_deref(), Some("sage"));
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.credential.is_none());
        assert!(config.realtime.is_none());
        assert!(config.security.is_none());
    }

    #[test]
    fn test_yaml_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("voice.yaml");
        fs::write(&path, "credential:\n  url: \"https://b.example.com\"\n").unwrap();

        let config = YamlConfig::from_file(&path).unwrap();
        assert_eq!(
            config.credential.unwrap().url.as_deref(),
            Some("https://b.example.com")
        );
    }

    #[test]
    fn test_yaml_from_file_missing() {
        let result = YamlConfig::from_file(&PathBuf::from("/nonexistent/voice.yaml"));
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }
}
