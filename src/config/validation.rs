//! Configuration validation.

use crate::utils::url_validation::{EndpointKind, validate_endpoint_url};

use super::VoiceConfig;

/// Validate a merged configuration.
///
/// # Errors
/// - the credential URL is empty
/// - the connect timeout is zero
/// - either endpoint fails [`validate_endpoint_url`]
pub(super) fn validate(config: &VoiceConfig) -> Result<(), String> {
    if config.credential_url.trim().is_empty() {
        return Err(
            "Credential URL is required (set VOICE_CREDENTIAL_URL or credential.url)".to_string(),
        );
    }

    if config.connect_timeout_seconds == 0 {
        return Err("Connect timeout must be greater than 0 seconds".to_string());
    }

    validate_endpoint_url(
        &config.credential_url,
        EndpointKind::Http,
        config.allow_insecure_endpoints,
    )
    .map_err(|e| format!("Invalid credential URL '{}': {e}", config.credential_url))?;

    validate_endpoint_url(
        &config.realtime_url,
        EndpointKind::WebSocket,
        config.allow_insecure_endpoints,
    )
    .map_err(|e| format!("Invalid realtime URL '{}': {e}", config.realtime_url))?;

    if config.model.trim().is_empty() {
        return Err("Realtime model must not be empty".to_string());
    }

    Ok(())
}
