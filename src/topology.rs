//! Static topology description
//!
//! The default topology is a simplified satellite "bent pipe":
//!
//! ```text
//!        192.168.1.1/24            100.64.0.1/10           10.10.10.101/24
//! user ---------------- router ---------------- pop ---------------- dst
//!   192.168.1.101/24       100.76.100.1/10        10.10.10.1/24
//! ```
//!
//! Only the router <-> pop hop (the satellite segment) is shaped by the
//! trace; the terrestrial hops run at 1 Gbit with no added delay.

use crate::emulator::Interface;
use crate::errors::{NetemError, Result};
use crate::types::{Endpoint, LinkParameters};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Point-to-point link between two endpoints
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopologyLink {
    pub a: Endpoint,
    pub b: Endpoint,
    /// Parameters applied when the link is created
    pub params: LinkParameters,
}

/// Interface address in CIDR notation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub endpoint: Endpoint,
    pub cidr: String,
}

/// Static route installed in a host
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub host: String,
    /// `default` or a CIDR prefix
    pub destination: String,
    pub via: Ipv4Addr,
    pub dev: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub hosts: Vec<String>,
    pub links: Vec<TopologyLink>,
    pub addresses: Vec<Address>,
    pub routes: Vec<Route>,
    /// Hosts that forward IPv4 between their interfaces
    pub forwarders: Vec<String>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_host(&mut self, name: impl Into<String>) -> &mut Self {
        self.hosts.push(name.into());
        self
    }

    pub fn add_link(&mut self, a: Endpoint, b: Endpoint, params: LinkParameters) -> &mut Self {
        self.links.push(TopologyLink { a, b, params });
        self
    }

    pub fn add_address(&mut self, endpoint: Endpoint, cidr: impl Into<String>) -> &mut Self {
        self.addresses.push(Address {
            endpoint,
            cidr: cidr.into(),
        });
        self
    }

    pub fn add_route(
        &mut self,
        host: impl Into<String>,
        destination: impl Into<String>,
        via: Ipv4Addr,
        dev: impl Into<String>,
    ) -> &mut Self {
        self.routes.push(Route {
            host: host.into(),
            destination: destination.into(),
            via,
            dev: dev.into(),
        });
        self
    }

    pub fn add_forwarder(&mut self, host: impl Into<String>) -> &mut Self {
        self.forwarders.push(host.into());
        self
    }

    /// The four-node satellite topology
    pub fn bent_pipe() -> Self {
        let terrestrial = LinkParameters::new(0, 1000, 0.0);
        let satellite = LinkParameters::new(100, 100, 0.0);

        let mut topo = Self::new();
        for host in ["user", "router", "pop", "dst"] {
            topo.add_host(host);
        }

        topo.add_link(
            Endpoint::new("user", "user-eth0"),
            Endpoint::new("router", "router-eth0"),
            terrestrial.clone(),
        )
        .add_link(
            Endpoint::new("router", "router-eth1"),
            Endpoint::new("pop", "pop-eth0"),
            satellite,
        )
        .add_link(
            Endpoint::new("pop", "pop-eth1"),
            Endpoint::new("dst", "dst-eth0"),
            terrestrial,
        );

        topo.add_address(Endpoint::new("user", "user-eth0"), "192.168.1.101/24")
            .add_address(Endpoint::new("router", "router-eth0"), "192.168.1.1/24")
            .add_address(Endpoint::new("router", "router-eth1"), "100.76.100.1/10")
            .add_address(Endpoint::new("pop", "pop-eth0"), "100.64.0.1/10")
            .add_address(Endpoint::new("pop", "pop-eth1"), "10.10.10.1/24")
            .add_address(Endpoint::new("dst", "dst-eth0"), "10.10.10.101/24");

        let router_lan = Ipv4Addr::new(192, 168, 1, 1);
        let pop_gateway = Ipv4Addr::new(100, 64, 0, 1);
        let router_wan = Ipv4Addr::new(100, 76, 100, 1);
        let pop_lan = Ipv4Addr::new(10, 10, 10, 1);

        topo.add_route("user", "default", router_lan, "user-eth0")
            .add_route("user", "10.10.10.0/24", router_lan, "user-eth0")
            .add_route("router", "default", pop_gateway, "router-eth1")
            .add_route("router", "10.10.10.0/24", pop_gateway, "router-eth1")
            .add_route("pop", "192.168.1.0/24", router_wan, "pop-eth0")
            .add_route("dst", "default", pop_lan, "dst-eth0");

        topo.add_forwarder("router").add_forwarder("pop");
        topo
    }

    /// Interfaces of `host` with the far end of each link
    pub fn interfaces(&self, host: &str) -> Vec<Interface> {
        self.links
            .iter()
            .filter_map(|link| {
                if link.a.host == host {
                    Some(Interface {
                        name: link.a.intf.clone(),
                        peer: Some(link.b.clone()),
                    })
                } else if link.b.host == host {
                    Some(Interface {
                        name: link.b.intf.clone(),
                        peer: Some(link.a.clone()),
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let mut hosts = HashSet::new();
        for host in &self.hosts {
            if !hosts.insert(host.as_str()) {
                return Err(NetemError::InvalidParameter(format!(
                    "Duplicate host name: {}",
                    host
                )));
            }
        }

        let mut endpoints = HashSet::new();
        for link in &self.links {
            link.params.validate()?;
            for endpoint in [&link.a, &link.b] {
                if !hosts.contains(endpoint.host.as_str()) {
                    return Err(NetemError::InvalidParameter(format!(
                        "Link endpoint {} refers to unknown host",
                        endpoint
                    )));
                }
                if !endpoints.insert(endpoint) {
                    return Err(NetemError::InvalidParameter(format!(
                        "Interface {} used by more than one link",
                        endpoint
                    )));
                }
            }
        }

        for address in &self.addresses {
            if !endpoints.contains(&address.endpoint) {
                return Err(NetemError::InvalidParameter(format!(
                    "Address {} assigned to unknown interface {}",
                    address.cidr, address.endpoint
                )));
            }
        }

        for host in self.routes.iter().map(|r| &r.host).chain(&self.forwarders) {
            if !hosts.contains(host.as_str()) {
                return Err(NetemError::InvalidParameter(format!(
                    "Unknown host: {}",
                    host
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bent_pipe_is_valid() {
        let topo = Topology::bent_pipe();
        assert!(topo.validate().is_ok());
        assert_eq!(topo.hosts.len(), 4);
        assert_eq!(topo.links.len(), 3);
    }

    #[test]
    fn test_router_interfaces() {
        let topo = Topology::bent_pipe();
        let interfaces = topo.interfaces("router");
        assert_eq!(interfaces.len(), 2);

        let wan = interfaces
            .iter()
            .find(|i| i.name == "router-eth1")
            .expect("router-eth1 present");
        assert_eq!(wan.peer, Some(Endpoint::new("pop", "pop-eth0")));
    }

    #[test]
    fn test_unknown_host_has_no_interfaces() {
        assert!(Topology::bent_pipe().interfaces("satellite").is_empty());
    }

    #[test]
    fn test_validation_errors() {
        let mut topo = Topology::new();
        topo.add_host("a").add_host("a");
        assert!(topo.validate().is_err());

        let mut topo = Topology::new();
        topo.add_host("a").add_link(
            Endpoint::new("a", "a-eth0"),
            Endpoint::new("b", "b-eth0"),
            LinkParameters::default(),
        );
        assert!(topo.validate().is_err());

        let mut topo = Topology::new();
        topo.add_host("a").add_host("b").add_link(
            Endpoint::new("a", "a-eth0"),
            Endpoint::new("b", "b-eth0"),
            LinkParameters::default(),
        );
        topo.add_address(Endpoint::new("a", "a-eth1"), "10.0.0.1/24");
        assert!(topo.validate().is_err());
    }
}
