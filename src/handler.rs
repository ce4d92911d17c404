use std::time::Duration;

use tracing::{debug, info, warn};

use crate::lease::V4Lease;
use crate::options::{DhcpOption, OptionCode};
use crate::packet::DhcpPacket;
use crate::resolver::LeaseResolver;

/// Fills DHCPv4 replies from leases stored in the inventory service.
#[derive(Clone)]
pub struct V4Handler {
    resolver: LeaseResolver,
    deadline: Duration,
}

impl V4Handler {
    pub fn new(resolver: LeaseResolver, deadline: Duration) -> Self {
        Self { resolver, deadline }
    }

    /// Resolves the client's lease and writes it into `response`.
    ///
    /// Returns false when the request must be dropped: no lease, ambiguous
    /// lease, lookup failure, or a lease that cannot be encoded. `response`
    /// is left untouched in that case.
    pub async fn handle(&self, request: &DhcpPacket, response: &mut DhcpPacket) -> bool {
        debug!("Received DHCPv4 packet: {}", request.summary());
        let mac = request.format_mac();

        let resolved = match self.resolver.resolve_v4_within(&mac, self.deadline).await {
            Ok(resolved) => resolved,
            Err(error) => {
                warn!("No IPs found for MAC {}: {}", mac, error);
                return false;
            }
        };

        if let Err(error) = apply_lease(request, response, &resolved.lease) {
            warn!("MAC {} has an unusable lease: {}...dropping request", mac, error);
            return false;
        }
        // Option 12 needs at least one byte.
        if !resolved.hostname.is_empty() {
            response.update_option(DhcpOption::Hostname(resolved.hostname.clone()));
        }

        info!(
            "Answering {} with {} ({})",
            mac, resolved.lease.cidr, resolved.hostname
        );
        true
    }
}

fn apply_lease(
    request: &DhcpPacket,
    response: &mut DhcpPacket,
    lease: &V4Lease,
) -> crate::Result<()> {
    let (address, mask) = lease.address_and_mask()?;

    response.yiaddr = address;
    response.update_option(DhcpOption::SubnetMask(mask));
    response.update_option(DhcpOption::Router(vec![lease.gateway]));

    if request.is_option_requested(OptionCode::DnsServer) && !lease.resolvers.is_empty() {
        response.update_option(DhcpOption::DnsServer(lease.resolvers.clone()));
    }

    if let Some((server, file)) = lease.boot() {
        response.update_option(DhcpOption::TftpServerName(server.to_string()));
        response.update_option(DhcpOption::BootfileName(file.to_string()));
    }

    Ok(())
}

/// DHCPv6 counterpart. Address assignment over DHCPv6 is not implemented,
/// so every request is declined.
#[derive(Debug, Clone, Copy, Default)]
pub struct V6Handler;

impl V6Handler {
    pub async fn handle(&self, request: &[u8]) -> bool {
        debug!("Received DHCPv6 packet ({} bytes), declining", request.len());
        false
    }
}
