//! Linux network namespace backend
//!
//! Every topology host is a network namespace named after the host and every
//! link is a veth pair. Shaping uses a root netem qdisc per interface, set
//! with `tc qdisc replace` so re-applying the same values changes nothing.
//! Requires CAP_NET_ADMIN.

use crate::emulator::{Emulator, Interface};
use crate::errors::{NetemError, Result};
use crate::topology::Topology;
use crate::types::{Endpoint, LinkParameters};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Emulator backed by network namespaces and veth pairs
#[derive(Debug)]
pub struct NetnsEmulator {
    topology: Topology,
}

impl NetnsEmulator {
    pub fn new(topology: Topology) -> Result<Self> {
        topology.validate()?;
        Ok(Self { topology })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Create namespaces, links, addresses and routes
    pub async fn up(&self) -> Result<()> {
        info!(
            "Bringing up topology: {} hosts, {} links",
            self.topology.hosts.len(),
            self.topology.links.len()
        );

        for host in &self.topology.hosts {
            run_ip(&["netns", "add", host]).await?;
            run_ip(&["-n", host, "link", "set", "lo", "up"]).await?;
        }

        for link in &self.topology.links {
            run_ip(&[
                "link", "add", &link.a.intf, "netns", &link.a.host, "type", "veth", "peer",
                "name", &link.b.intf, "netns", &link.b.host,
            ])
            .await?;

            for endpoint in [&link.a, &link.b] {
                run_ip(&["-n", &endpoint.host, "link", "set", &endpoint.intf, "up"]).await?;
                self.set_link_params(endpoint, &link.params).await?;
            }
            debug!("Created link {} <-> {}", link.a, link.b);
        }

        for address in &self.topology.addresses {
            let endpoint = &address.endpoint;
            run_ip(&[
                "-n", &endpoint.host, "addr", "add", &address.cidr, "dev", &endpoint.intf,
            ])
            .await?;
        }

        for host in &self.topology.forwarders {
            for setting in [
                "net.ipv4.ip_forward=1",
                "net.ipv4.conf.all.rp_filter=0",
            ] {
                run_ip(&["netns", "exec", host, "sysctl", "-w", setting]).await?;
            }
        }

        for route in &self.topology.routes {
            let via = route.via.to_string();
            run_ip(&[
                "-n", &route.host, "route", "add", &route.destination, "via", &via, "dev",
                &route.dev,
            ])
            .await?;
        }

        info!("Topology is up");
        Ok(())
    }

    /// Delete every namespace of the topology; veth pairs go with them
    pub async fn down(&self) -> Result<()> {
        info!("Tearing down topology");
        for host in &self.topology.hosts {
            if let Err(e) = run_ip(&["netns", "del", host]).await {
                warn!("Failed to delete namespace {}: {}", host, e);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Emulator for NetnsEmulator {
    async fn interfaces(&self, host: &str) -> Vec<Interface> {
        self.topology.interfaces(host)
    }

    async fn set_link_params(&self, endpoint: &Endpoint, params: &LinkParameters) -> Result<()> {
        let mut args = vec![
            "netns".to_string(),
            "exec".into(),
            endpoint.host.clone(),
        ];
        args.extend(netem_args(&endpoint.intf, params));

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_ip(&args).await?;
        debug!("Applied netem on {}: {}", endpoint, params);
        Ok(())
    }
}

/// `tc` arguments that install (or replace) the root netem qdisc
pub fn netem_args(dev: &str, params: &LinkParameters) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "tc".into(),
        "qdisc".into(),
        "replace".into(),
        "dev".into(),
        dev.into(),
        "root".into(),
        "netem".into(),
        "delay".into(),
        format!("{}ms", params.delay_ms),
        "rate".into(),
        format!("{}mbit", params.bandwidth_mbps),
    ];

    if params.loss_pct > 0.0 {
        args.push("loss".into());
        args.push(format!("{}%", params.loss_pct));
    }
    args
}

async fn run_ip(args: &[&str]) -> Result<()> {
    let command = format!("ip {}", args.join(" "));
    debug!("Running {}", command);

    let output = Command::new("ip").args(args).output().await?;
    if !output.status.success() {
        return Err(NetemError::CommandFailed {
            command,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}
