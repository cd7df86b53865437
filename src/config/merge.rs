//! Merging YAML overrides onto the environment-derived base.

use super::VoiceConfig;
use super::env::{load_from_env, parse_voice};
use super::yaml::YamlConfig;

/// Load the environment base and apply any YAML values on top.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<VoiceConfig, String> {
    let mut config = load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(credential) = yaml.credential {
        if let Some(url) = credential.url {
            config.credential_url = url;
        }
        if let Some(key) = credential.api_key {
            config.backend_api_key = Some(key);
        }
    }

    if let Some(realtime) = yaml.realtime {
        if let Some(url) = realtime.url {
            config.realtime_url = url;
        }
        if let Some(model) = realtime.model {
            config.model = model;
        }
        if let Some(voice) = realtime.voice {
            config.voice = parse_voice(&voice)?;
        }
        if let Some(instructions) = realtime.instructions {
            config.instructions = Some(instructions);
        }
        if let Some(timeout) = realtime.connect_timeout_seconds {
            config.connect_timeout_seconds = timeout;
        }
    }

    if let Some(audio) = yaml.audio {
        if let Some(device) = audio.input_device {
            config.input_device = Some(device);
        }
        if let Some(flag) = audio.echo_cancellation {
            config.echo_cancellation = flag;
        }
        if let Some(flag) = audio.noise_suppression {
            config.noise_suppression = flag;
        }
        if let Some(flag) = audio.auto_gain_control {
            config.auto_gain_control = flag;
        }
    }

    if let Some(flag) = yaml.security.and_then(|s| s.allow_insecure_endpoints) {
        config.allow_insecure_endpoints = flag;
    }

    Ok(config)
}
