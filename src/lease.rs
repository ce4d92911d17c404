//! DHCP lease records as stored in inventory attributes.
//!
//! A server record in the inventory service carries an attribute blob under
//! the [`DHCP_ATTRIBUTE_NAMESPACE`] namespace. Its payload decodes into a
//! [`LeaseData`], which holds every IPv4 and IPv6 lease assigned to the
//! interfaces of that machine:
//!
//! ```json
//! {
//!   "ipv4": [{"mac_address": "aa:bb:cc:dd:ee:ff", "cidr": "10.1.2.10/24",
//!             "gateway": "10.1.2.1", "resolvers": ["1.1.1.1"]}],
//!   "ipv6": []
//! }
//! ```
//!
//! Lease data is decoded fresh for every lookup and never cached.
//! MAC uniqueness inside a set is not checked at decode time; the resolver
//! selects the first exact match.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Attribute namespace holding DHCP lease data on inventory records.
pub const DHCP_ATTRIBUTE_NAMESPACE: &str = "sh.hollow.dhcpserver.lease";

/// Normalizes a MAC address for querying and comparison.
///
/// Lowercases, trims surrounding whitespace and turns `-` separators into `:`.
pub fn normalize_mac(mac: &str) -> String {
    mac.trim().to_lowercase().replace('-', ":")
}

/// All leases attached to one inventory record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseData {
    #[serde(rename = "ipv4", default, skip_serializing_if = "Vec::is_empty")]
    pub v4_leases: Vec<V4Lease>,

    #[serde(rename = "ipv6", default, skip_serializing_if = "Vec::is_empty")]
    pub v6_leases: Vec<V6Lease>,
}

impl LeaseData {
    /// Decodes an attribute payload.
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Returns the IPv4 lease whose MAC equals `mac` exactly.
    ///
    /// `mac` is expected to be normalized already.
    pub fn find_v4(&self, mac: &str) -> Option<&V4Lease> {
        self.v4_leases.iter().find(|lease| lease.mac_address == mac)
    }

    /// Returns the IPv6 lease whose MAC equals `mac` exactly.
    pub fn find_v6(&self, mac: &str) -> Option<&V6Lease> {
        self.v6_leases.iter().find(|lease| lease.mac_address == mac)
    }
}

/// An IPv4 lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V4Lease {
    /// Hardware address of the interface, lowercase colon-separated.
    pub mac_address: String,

    /// Assigned address with prefix length, e.g. `10.1.2.10/24`.
    pub cidr: String,

    pub gateway: Ipv4Addr,

    /// DNS resolvers, in order of preference.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolvers: Vec<Ipv4Addr>,

    /// TFTP server name (Option 66).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_server: Option<String>,

    /// Boot file name (Option 67).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_file: Option<String>,
}

impl V4Lease {
    /// Splits [`cidr`](Self::cidr) into the host address and its subnet mask.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLease`] if the address or prefix length is malformed.
    pub fn address_and_mask(&self) -> Result<(Ipv4Addr, Ipv4Addr)> {
        let (address, prefix) = self
            .cidr
            .split_once('/')
            .ok_or_else(|| Error::InvalidLease(format!("missing prefix in {}", self.cidr)))?;

        let address: Ipv4Addr = address
            .parse()
            .map_err(|error| Error::InvalidLease(format!("bad address in {}: {}", self.cidr, error)))?;

        let prefix: u32 = prefix
            .parse()
            .ok()
            .filter(|prefix| *prefix <= 32)
            .ok_or_else(|| Error::InvalidLease(format!("bad prefix length in {}", self.cidr)))?;

        let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
        Ok((address, Ipv4Addr::from(mask)))
    }

    /// Returns the boot server and file when both are set.
    ///
    /// Network boot needs both values; one without the other is ignored.
    pub fn boot(&self) -> Option<(&str, &str)> {
        match (self.boot_server.as_deref(), self.boot_file.as_deref()) {
            (Some(server), Some(file)) if !server.is_empty() && !file.is_empty() => {
                Some((server, file))
            }
            _ => None,
        }
    }
}

/// An IPv6 lease. Gateway and resolvers are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V6Lease {
    pub mac_address: String,
    pub cidr: String,
    pub gateway: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolvers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_server: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_file: Option<String>,
}
