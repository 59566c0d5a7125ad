use crate::errors::AppError;
use std::fmt;
use std::str::FromStr;

const TCP_SCHEME: &str = "tcp://";

/// A `tcp://host:port` locator. The scheme is optional on input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint { host: host.into(), port }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// `host:port`, as accepted by tokio's bind and connect.
    pub fn socket_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let rest = trimmed.strip_prefix(TCP_SCHEME).unwrap_or(trimmed);
        if rest.contains("://") {
            return Err(AppError::Endpoint(format!("{} (only tcp:// is supported)", s)));
        }
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| AppError::Endpoint(format!("{} (expected host:port)", s)))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(AppError::Endpoint(format!("{} (empty host)", s)));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| AppError::Endpoint(format!("{} (bad port '{}')", s, port)))?;
        Ok(Endpoint::new(host, port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", TCP_SCHEME, self.socket_addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_scheme() {
        let a: Endpoint = "tcp://127.0.0.1:5559".parse().unwrap();
        let b: Endpoint = "127.0.0.1:5559".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.socket_addr(), "127.0.0.1:5559");
        assert_eq!(a.to_string(), "tcp://127.0.0.1:5559");
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let e: Endpoint = "tcp://[::1]:7000".parse().unwrap();
        assert_eq!(e.host(), "::1");
        assert_eq!(e.socket_addr(), "[::1]:7000");
        assert_eq!(e.to_string(), "tcp://[::1]:7000");
    }

    #[test]
    fn rejects_other_schemes_and_bad_ports() {
        assert!("ipc:///tmp/broker".parse::<Endpoint>().is_err());
        assert!("tcp://localhost".parse::<Endpoint>().is_err());
        assert!("tcp://localhost:http".parse::<Endpoint>().is_err());
        assert!("tcp://:5559".parse::<Endpoint>().is_err());
    }
}
