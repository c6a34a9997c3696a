use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// The ordered set of view endpoints a cluster topology names.
///
/// This is the boundary with whatever parses the cluster's configuration
/// document: the dispatcher only ever sees the resolved address list.
/// Duplicate addresses are dropped, keeping the first occurrence's position.
pub struct Topology {
    addrs: Vec<SocketAddr>,
}

impl Topology {
    /// Build a topology from already resolved addresses.
    pub fn new(addrs: impl IntoIterator<Item = SocketAddr>) -> Self {
        let mut seen = Vec::new();
        for addr in addrs {
            if !seen.contains(&addr) {
                seen.push(addr);
            }
        }
        Self { addrs: seen }
    }

    /// Resolve a list of `host:port` endpoint strings into a topology.
    ///
    /// Resolution is synchronous and side-effect free from the dispatcher's
    /// point of view; each endpoint contributes its first resolved address.
    pub fn from_endpoints<I, S>(endpoints: I) -> io::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut addrs = Vec::new();
        for endpoint in endpoints {
            let endpoint = endpoint.as_ref();
            let addr = endpoint.to_socket_addrs()?.next().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("endpoint `{endpoint}` resolved to no addresses"),
                )
            })?;
            addrs.push(addr);
        }
        Ok(Self::new(addrs))
    }

    #[inline]
    /// The resolved view endpoints, in topology order.
    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    #[inline]
    /// Whether the topology names the given endpoint.
    pub fn contains(&self, addr: SocketAddr) -> bool {
        self.addrs.contains(&addr)
    }
}

impl FromIterator<SocketAddr> for Topology {
    fn from_iter<T: IntoIterator<Item = SocketAddr>>(iter: T) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        ([127, 0, 0, 1], port).into()
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let topology = Topology::new([addr(1), addr(2), addr(1), addr(3)]);
        assert_eq!(topology.addrs(), &[addr(1), addr(2), addr(3)]);
    }

    #[test]
    fn test_from_endpoints_resolves() {
        let topology =
            Topology::from_endpoints(["127.0.0.1:8092", "127.0.0.1:8093"]).unwrap();
        assert_eq!(topology.len(), 2);
        assert!(topology.contains(addr(8092)));
    }

    #[test]
    fn test_unresolvable_endpoint_errors() {
        let result = Topology::from_endpoints(["definitely not an endpoint"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_topology() {
        let topology = Topology::default();
        assert!(topology.is_empty());
        assert!(!topology.contains(addr(1)));
    }
}
