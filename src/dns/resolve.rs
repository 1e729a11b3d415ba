//! The `Resolve` abstraction and a static-override wrapper.

use crate::base::neterror::NetError;
use std::{collections::HashMap, fmt, future::Future, net::SocketAddr, pin::Pin, sync::Arc};

/// A host name to look up, normalized to lowercase.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Name {
    host: Box<str>,
}

impl Name {
    pub fn new(host: impl AsRef<str>) -> Self {
        Self {
            host: host.as_ref().to_ascii_lowercase().into_boxed_str(),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.host
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name::new(value)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.host, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

/// Resolved addresses. Ports are 0; the connector fills in the target port.
pub type Addrs = Box<dyn Iterator<Item = SocketAddr> + Send>;

pub type Resolving = Pin<Box<dyn Future<Output = Result<Addrs, NetError>> + Send>>;

/// Pluggable name to address lookup used by the plain channel factory.
pub trait Resolve: Send + Sync {
    fn resolve(&self, name: Name) -> Resolving;
}

impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn resolve(&self, name: Name) -> Resolving {
        (**self).resolve(name)
    }
}

/// Answers configured host names from a static table and delegates
/// everything else to `inner`.
///
/// ```rust,ignore
/// let mut overrides = HashMap::new();
/// overrides.insert("example.test".to_string(), vec!["127.0.0.1:0".parse()?]);
/// let resolver = DnsResolverWithOverrides::new(Arc::new(GaiResolver::new()), overrides);
/// ```
pub struct DnsResolverWithOverrides {
    inner: Arc<dyn Resolve>,
    overrides: Arc<HashMap<Name, Vec<SocketAddr>>>,
}

impl DnsResolverWithOverrides {
    pub fn new(inner: Arc<dyn Resolve>, overrides: HashMap<String, Vec<SocketAddr>>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|(host, addrs)| (Name::new(host), addrs))
            .collect();
        Self {
            inner,
            overrides: Arc::new(overrides),
        }
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }
}

impl Resolve for DnsResolverWithOverrides {
    fn resolve(&self, name: Name) -> Resolving {
        if let Some(addrs) = self.overrides.get(&name) {
            tracing::debug!(host = %name, "resolved from override table");
            let addrs: Addrs = Box::new(addrs.clone().into_iter());
            return Box::pin(std::future::ready(Ok(addrs)));
        }
        self.inner.resolve(name)
    }
}

impl fmt::Debug for DnsResolverWithOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsResolverWithOverrides")
            .field("override_count", &self.overrides.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    struct FixedResolver(Vec<SocketAddr>);

    impl Resolve for FixedResolver {
        fn resolve(&self, _name: Name) -> Resolving {
            let addrs = self.0.clone();
            Box::pin(async move { Ok(Box::new(addrs.into_iter()) as Addrs) })
        }
    }

    fn addr(a: u8, b: u8, c: u8, d: u8) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(a, b, c, d)), 0)
    }

    #[test]
    fn test_name_is_lowercased() {
        assert_eq!(Name::from("Example.TEST").as_str(), "example.test");
        assert_eq!(Name::new("A.b"), Name::new("a.B"));
    }

    #[tokio::test]
    async fn test_override_hit_ignores_case() {
        let mut overrides = HashMap::new();
        overrides.insert("Example.Test".to_string(), vec![addr(127, 0, 0, 1)]);
        let resolver =
            DnsResolverWithOverrides::new(Arc::new(FixedResolver(vec![addr(8, 8, 8, 8)])), overrides);

        let addrs: Vec<_> = resolver.resolve(Name::new("example.test")).await.unwrap().collect();
        assert_eq!(addrs, vec![addr(127, 0, 0, 1)]);
        assert_eq!(resolver.override_count(), 1);
    }

    #[tokio::test]
    async fn test_override_miss_falls_through() {
        let resolver = DnsResolverWithOverrides::new(
            Arc::new(FixedResolver(vec![addr(8, 8, 8, 8)])),
            HashMap::new(),
        );
        let addrs: Vec<_> = resolver.resolve(Name::new("other.test")).await.unwrap().collect();
        assert_eq!(addrs, vec![addr(8, 8, 8, 8)]);
    }
}
