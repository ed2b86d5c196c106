use crate::types::{RealtimeError, Result};
use url::Url;

/// Resolves a channel path against the realtime base endpoint.
///
/// `http(s)` bases are rewritten to `ws(s)`. The resulting URL never carries
/// credentials; the token is sent in the authenticate frame instead.
pub fn resolve_ws_url(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();

    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(RealtimeError::Connection(format!(
                "unsupported endpoint scheme '{}'",
                other
            )));
        }
    };
    if base.scheme() != scheme && base.set_scheme(scheme).is_err() {
        return Err(RealtimeError::Connection(format!(
            "cannot rewrite endpoint scheme to '{}'",
            scheme
        )));
    }

    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.set_query(None);
    base.set_fragment(None);

    Ok(base.join(path.trim_start_matches('/'))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_resolve_rewrites_http_schemes() {
        assert_eq!(
            resolve_ws_url(&url("https://api.example.com"), "ws/notifications/")
                .unwrap()
                .as_str(),
            "wss://api.example.com/ws/notifications/"
        );
        assert_eq!(
            resolve_ws_url(&url("http://localhost:8000"), "/ws/chat/42/")
                .unwrap()
                .as_str(),
            "ws://localhost:8000/ws/chat/42/"
        );
    }

    #[test]
    fn test_resolve_keeps_base_path() {
        assert_eq!(
            resolve_ws_url(&url("wss://example.com/realtime"), "call/abc/")
                .unwrap()
                .as_str(),
            "wss://example.com/realtime/call/abc/"
        );
    }

    #[test]
    fn test_resolve_drops_base_query() {
        let resolved =
            resolve_ws_url(&url("wss://example.com/?token=leaked"), "ws/notifications/").unwrap();
        assert_eq!(resolved.query(), None);
    }

    #[test]
    fn test_resolve_rejects_other_schemes() {
        assert!(resolve_ws_url(&url("ftp://example.com"), "ws/").is_err());
    }
}
