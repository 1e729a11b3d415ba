//! Parsed `http`/`https` URLs.

use crate::base::neterror::NetError;
use std::fmt;
use url::Url;

/// An absolute `http` or `https` URL split into the parts the engine needs.
///
/// The port is always resolved (scheme default when absent) and `file` is
/// the request target sent on the wire: path plus `?query`, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpUrl {
    url: Url,
    host: String,
    port: u16,
}

impl HttpUrl {
    pub fn parse(input: &str) -> Result<Self, NetError> {
        let url = Url::parse(input.trim()).map_err(|_| NetError::InvalidUrl)?;
        Self::from_url(url)
    }

    pub fn from_url(mut url: Url) -> Result<Self, NetError> {
        match url.scheme() {
            "http" | "https" => {}
            _ => return Err(NetError::UnknownUrlScheme),
        }
        let host = match url.host() {
            Some(url::Host::Ipv6(addr)) => addr.to_string(),
            Some(host) => host.to_string(),
            None => return Err(NetError::InvalidUrl),
        };
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;
        // Fragments never go on the wire.
        url.set_fragment(None);
        Ok(Self { url, host, port })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn is_https(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// Host without brackets for IPv6 literals.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Path and query, as written in the request line.
    pub fn file(&self) -> String {
        let path = match self.url.path() {
            "" => "/",
            p => p,
        };
        match self.url.query() {
            Some(q) => format!("{path}?{q}"),
            None => path.to_string(),
        }
    }

    /// Value for the `Host` header: `host[:port]`, port omitted when it is
    /// the scheme default.
    pub fn host_header(&self) -> String {
        let host = match self.url.host() {
            Some(url::Host::Ipv6(addr)) => format!("[{addr}]"),
            _ => self.host.clone(),
        };
        if Some(self.port) == default_port(self.scheme()) {
            host
        } else {
            format!("{host}:{}", self.port)
        }
    }

    /// Resolves a redirect target against this URL.
    ///
    /// Returns `None` when the target cannot be parsed or uses a scheme other
    /// than `http`/`https`.
    pub fn resolve(&self, location: &str) -> Option<HttpUrl> {
        let joined = self.url.join(location.trim()).ok()?;
        HttpUrl::from_url(joined).ok()
    }

    /// True when both URLs address the same host and port.
    pub fn same_endpoint(&self, other: &HttpUrl) -> bool {
        self.port == other.port && self.host.eq_ignore_ascii_case(&other.host)
    }
}

pub(crate) fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

impl fmt::Display for HttpUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.url, f)
    }
}

impl std::str::FromStr for HttpUrl {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpUrl::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        let url = HttpUrl::parse("http://example.test/a").unwrap();
        assert_eq!(url.port(), 80);
        assert!(!url.is_https());

        let url = HttpUrl::parse("https://example.test").unwrap();
        assert_eq!(url.port(), 443);
        assert!(url.is_https());
    }

    #[test]
    fn test_file_includes_query() {
        let url = HttpUrl::parse("http://example.test:8080/search?q=rust&x=1#frag").unwrap();
        assert_eq!(url.file(), "/search?q=rust&x=1");
        assert_eq!(url.port(), 8080);
    }

    #[test]
    fn test_file_defaults_to_root() {
        let url = HttpUrl::parse("http://example.test").unwrap();
        assert_eq!(url.file(), "/");
    }

    #[test]
    fn test_host_header() {
        assert_eq!(
            HttpUrl::parse("http://example.test:80/a").unwrap().host_header(),
            "example.test"
        );
        assert_eq!(
            HttpUrl::parse("http://example.test:8080/a").unwrap().host_header(),
            "example.test:8080"
        );
        assert_eq!(
            HttpUrl::parse("https://[::1]:8443/").unwrap().host_header(),
            "[::1]:8443"
        );
    }

    #[test]
    fn test_ipv6_host_has_no_brackets() {
        let url = HttpUrl::parse("http://[::1]:8080/").unwrap();
        assert_eq!(url.host(), "::1");
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert_eq!(
            HttpUrl::parse("ftp://example.test/").unwrap_err(),
            NetError::UnknownUrlScheme
        );
        assert_eq!(HttpUrl::parse("not a url").unwrap_err(), NetError::InvalidUrl);
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let base = HttpUrl::parse("http://example.test/dir/page").unwrap();
        assert_eq!(
            base.resolve("other").unwrap().to_string(),
            "http://example.test/dir/other"
        );
        assert_eq!(
            base.resolve("/root").unwrap().to_string(),
            "http://example.test/root"
        );
        assert_eq!(
            base.resolve("https://secure.test/x").unwrap().to_string(),
            "https://secure.test/x"
        );
        assert!(base.resolve("mailto:someone@example.test").is_none());
    }
}
