//! Bind address resolution.

use std::net::IpAddr;

use pnet::datalink;

use crate::error::{NodeError, NodeResult};

/// Where listeners are bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindTarget {
    /// First IPv4 address of the named interface.
    Interface(String),
    /// A fixed address.
    Address(IpAddr),
}

impl BindTarget {
    pub fn resolve(&self) -> NodeResult<IpAddr> {
        match self {
            BindTarget::Interface(name) => interface_ipv4(name),
            BindTarget::Address(addr) => Ok(*addr),
        }
    }
}

/// Look up the first IPv4 address assigned to `name`.
pub fn interface_ipv4(name: &str) -> NodeResult<IpAddr> {
    let interface = datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| NodeError::AddressResolution(format!("interface {name} not found")))?;

    interface
        .ips
        .iter()
        .find(|network| network.is_ipv4())
        .map(|network| network.ip())
        .ok_or_else(|| {
            NodeError::AddressResolution(format!("interface {name} has no IPv4 address"))
        })
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn test_fixed_address() {
        let target = BindTarget::Address(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(target.resolve().unwrap(), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_missing_interface() {
        let target = BindTarget::Interface("nosuchif0".to_string());
        assert!(matches!(
            target.resolve(),
            Err(NodeError::AddressResolution(_))
        ));
    }
}
