//! WebSocket channel setup.

use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};
use tracing::{debug, info};
use url::Url;

use super::base::{SessionError, SessionResult};
use super::credential::EphemeralCredential;

/// An open realtime channel.
pub type RealtimeStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Bounded capacity of the outbound event queue.
pub const WS_CHANNEL_CAPACITY: usize = 256;

/// Build `{base}?model={model}`.
pub fn realtime_url(base: &str, model: &str) -> SessionResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| SessionError::InvalidConfiguration(format!("invalid realtime URL: {e}")))?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(SessionError::InvalidConfiguration(format!(
                "realtime URL must use ws or wss, got '{other}'"
            )));
        }
    }
    url.query_pairs_mut().append_pair("model", model);
    Ok(url)
}

fn host_header(url: &Url) -> SessionResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| SessionError::InvalidConfiguration("realtime URL has no host".to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Open an authenticated channel to the realtime service.
pub async fn open_channel(
    url: &Url,
    credential: &EphemeralCredential,
) -> SessionResult<RealtimeStream> {
    let request = http::Request::builder()
        .uri(url.as_str())
        .header("Authorization", format!("Bearer {}", credential.token()))
        .header("OpenAI-Beta", "realtime=v1")
        .header("Sec-WebSocket-Protocol", "realtime")
        .header(
            "Sec-WebSocket-Key",
            tungstenite::handshake::client::generate_key(),
        )
        .header("Sec-WebSocket-Version", "13")
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Host", host_header(url)?)
        .body(())
        .map_err(|e| SessionError::ChannelOpen(e.to_string()))?;

    let (stream, response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| SessionError::ChannelOpen(e.to_string()))?;

    debug!(status = %response.status(), "Realtime handshake response");
    info!(host = url.host_str().unwrap_or_default(), "Realtime channel open");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realtime_url_appends_model() {
        let url = realtime_url("wss://api.openai.com/v1/realtime", "gpt-4o-realtime-preview").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview"
        );
    }

    #[test]
    fn test_realtime_url_rejects_http() {
        assert!(matches!(
            realtime_url("https://api.openai.com/v1/realtime", "m"),
            Err(SessionError::InvalidConfiguration(_))
        ));
        assert!(realtime_url("not a url", "m").is_err());
    }

    #[test]
    fn test_host_header_includes_port() {
        let url = Url::parse("ws://127.0.0.1:9001/realtime").unwrap();
        assert_eq!(host_header(&url).unwrap(), "127.0.0.1:9001");

        let url = Url::parse("wss://api.openai.com/v1/realtime").unwrap();
        assert_eq!(host_header(&url).unwrap(), "api.openai.com");
    }
}
