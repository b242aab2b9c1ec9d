//! Resolves the user-facing hub host into a socket URL.

use std::fmt;

pub const DEFAULT_PATH: &str = "/ws";

const SCHEMES: [&str; 4] = ["wss://", "ws://", "https://", "http://"];

/// Where the transport connects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    secure: bool,
    path: String,
}

impl Endpoint {
    /// Normalizes `raw` (scheme and trailing slash stripped, `.local` added to
    /// bare hostnames). The scheme follows `secure_origin` only: a secure
    /// hosting origin always gets `wss`, whatever `raw` asked for.
    pub fn resolve(raw: &str, secure_origin: bool) -> Self {
        let mut host = raw.trim();
        for scheme in SCHEMES {
            if let Some(rest) = strip_prefix_ignore_case(host, scheme) {
                host = rest;
                break;
            }
        }
        let host = host.trim_end_matches('/');

        Self {
            host: qualify(host),
            secure: secure_origin,
            path: DEFAULT_PATH.to_string(),
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}{}", self.host, self.path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

/// Appends `.local` to a dotless hostname, keeping any port
fn qualify(host: &str) -> String {
    let (name, port) = match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            (name, Some(port))
        }
        _ => (host, None),
    };

    let name = if name.contains('.') || name.eq_ignore_ascii_case("localhost") || name.is_empty() {
        name.to_string()
    } else {
        format!("{name}.local")
    };

    match port {
        Some(port) => format!("{name}:{port}"),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_gets_local_suffix() {
        let endpoint = Endpoint::resolve("nodehub", false);
        assert_eq!(endpoint.url(), "ws://nodehub.local/ws");
    }

    #[test]
    fn test_scheme_and_trailing_slash_stripped() {
        let endpoint = Endpoint::resolve("http://192.168.1.40/", false);
        assert_eq!(endpoint.url(), "ws://192.168.1.40/ws");
    }

    #[test]
    fn test_localhost_untouched() {
        assert_eq!(
            Endpoint::resolve("localhost:8080", false).url(),
            "ws://localhost:8080/ws"
        );
    }

    #[test]
    fn test_port_preserved_on_bare_host() {
        assert_eq!(Endpoint::resolve("hub:81", false).host(), "hub.local:81");
    }

    #[test]
    fn test_secure_origin_upgrades_insecure_target() {
        let endpoint = Endpoint::resolve("ws://hub.example.com", true);
        assert!(endpoint.is_secure());
        assert_eq!(endpoint.url(), "wss://hub.example.com/ws");
    }

    #[test]
    fn test_insecure_origin_uses_ws() {
        assert_eq!(
            Endpoint::resolve("WSS://hub.example.com", false).url(),
            "ws://hub.example.com/ws"
        );
    }

    #[test]
    fn test_custom_path() {
        assert_eq!(
            Endpoint::resolve("hub", false).with_path("socket").url(),
            "ws://hub.local/socket"
        );
    }
}
