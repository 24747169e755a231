//! Socket URL resolution.
//!
//! Maps the configured base URL onto the fixed realtime endpoint, deriving
//! the `ws`/`wss` scheme from the base scheme and attaching the API key and
//! access token as query parameters.

use url::Url;

use crate::error::{RealtimeError, Result};

/// Fixed path of the realtime socket endpoint.
pub(crate) const SOCKET_PATH: &str = "/realtime/socket";

/// Resolve the realtime socket URL from a base URL.
///
/// Scheme mapping: `http` → `ws`, `https` → `wss`; `ws`/`wss` pass through.
/// Query parameters: `X-API-Key=<api_key>` always, `token=<access_token>`
/// when a token is supplied.
pub(crate) fn resolve_socket_url(
    base_url: &str,
    api_key: &str,
    access_token: Option<&str>,
) -> Result<String> {
    let base = Url::parse(base_url.trim())
        .map_err(|e| RealtimeError::InvalidUrl(format!("invalid base URL '{}': {}", base_url, e)))?;

    let ws_scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(RealtimeError::InvalidUrl(format!(
                "unsupported base URL scheme '{}'; expected http(s) or ws(s)",
                other
            )));
        },
    };

    let mut socket_url = base.clone();
    socket_url
        .set_scheme(ws_scheme)
        .map_err(|_| RealtimeError::InvalidUrl("failed to set socket URL scheme".to_string()))?;
    socket_url.set_path(SOCKET_PATH);
    socket_url.set_fragment(None);
    socket_url.set_query(None);

    {
        let mut query = socket_url.query_pairs_mut();
        query.append_pair("X-API-Key", api_key);
        if let Some(token) = access_token {
            query.append_pair("token", token);
        }
    }

    Ok(socket_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_base_maps_to_ws() {
        let url = resolve_socket_url("http://localhost:4000", "key123", Some("tok")).unwrap();
        assert!(url.starts_with("ws://localhost:4000/realtime/socket?"), "got {}", url);
        assert!(url.contains("X-API-Key=key123"));
        assert!(url.contains("token=tok"));
    }

    #[test]
    fn test_https_base_maps_to_wss() {
        let url = resolve_socket_url("https://example.com", "k", None).unwrap();
        assert!(url.starts_with("wss://example.com/realtime/socket?"), "got {}", url);
        assert!(!url.contains("token="), "token must be omitted when absent");
    }

    #[test]
    fn test_ws_scheme_passes_through() {
        let url = resolve_socket_url("ws://127.0.0.1:9999", "k", Some("t")).unwrap();
        assert!(url.starts_with("ws://127.0.0.1:9999/realtime/socket?"));
    }

    #[test]
    fn test_existing_path_and_query_are_replaced() {
        let url = resolve_socket_url("http://host/old/path?stale=1#frag", "k", None).unwrap();
        assert!(url.contains("/realtime/socket"));
        assert!(!url.contains("stale"));
        assert!(!url.contains("frag"));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(matches!(
            resolve_socket_url("not a url", "k", None),
            Err(RealtimeError::InvalidUrl(_))
        ));
        assert!(matches!(
            resolve_socket_url("ftp://host", "k", None),
            Err(RealtimeError::InvalidUrl(_))
        ));
    }
}
