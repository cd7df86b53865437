//! Environment variable loading.

use std::env;

use crate::core::realtime::openai::{DEFAULT_REALTIME_MODEL, REALTIME_URL, RealtimeVoice};

use super::VoiceConfig;

pub(super) const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a boolean flag. Accepts true/false, 1/0, yes/no and on/off.
pub(super) fn parse_bool(name: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("Invalid boolean for {name}: '{other}'")),
    }
}

fn bool_var(name: &str, default: bool) -> Result<bool, String> {
    match var(name) {
        Some(value) => parse_bool(name, &value),
        None => Ok(default),
    }
}

pub(super) fn parse_voice(value: &str) -> Result<RealtimeVoice, String> {
    value
        .parse::<RealtimeVoice>()
        .map_err(|e| format!("Invalid voice: {e}"))
}

/// Build a configuration from environment variables, falling back to defaults.
///
/// A missing credential URL is left empty here; validation rejects it once
/// YAML overrides have had a chance to supply it.
pub(super) fn load_from_env() -> Result<VoiceConfig, String> {
    let voice = match var("VOICE_DEFAULT_VOICE") {
        Some(v) => parse_voice(&v)?,
        None => RealtimeVoice::default(),
    };

    let connect_timeout_seconds = match var("VOICE_CONNECT_TIMEOUT_SECONDS") {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("Invalid VOICE_CONNECT_TIMEOUT_SECONDS '{v}': {e}"))?,
        None => DEFAULT_CONNECT_TIMEOUT_SECONDS,
    };

    Ok(VoiceConfig {
        credential_url: var("VOICE_CREDENTIAL_URL").unwrap_or_default(),
        backend_api_key: var("VOICE_BACKEND_API_KEY"),
        realtime_url: var("VOICE_REALTIME_URL").unwrap_or_else(|| REALTIME_URL.to_string()),
        model: var("VOICE_REALTIME_MODEL").unwrap_or_else(|| DEFAULT_REALTIME_MODEL.to_string()),
        voice,
        instructions: var("VOICE_INSTRUCTIONS"),
        connect_timeout_seconds,
        input_device: var("VOICE_INPUT_DEVICE"),
        echo_cancellation: bool_var("VOICE_ECHO_CANCELLATION", true)?,
        noise_suppression: bool_var("VOICE_NOISE_SUPPRESSION", true)?,
        auto_gain_control: bool_var("VOICE_AUTO_GAIN_CONTROL", true)?,
        allow_insecure_endpoints: bool_var("VOICE_ALLOW_INSECURE_ENDPOINTS", false)?,
    })
}
