//! Lease repository: the query side of a lookup.
//!
//! The inventory service only supports searching opaque attribute blobs, so a
//! MAC lookup is a substring match over the serialized lease list of one
//! family. It narrows the candidates but proves nothing; deciding which
//! record (if any) really owns the MAC is left to the
//! [`LeaseResolver`](crate::resolver::LeaseResolver).

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::inventory::{AttributeListParams, InventoryApi, Operator, Server, ServerListParams};
use crate::lease::DHCP_ATTRIBUTE_NAMESPACE;

/// Protocol family of a lease lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    /// Key of the lease list inside the attribute payload.
    pub fn attribute_key(&self) -> &'static str {
        match self {
            Self::V4 => "ipv4",
            Self::V6 => "ipv6",
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V4 => write!(f, "DHCPv4"),
            Self::V6 => write!(f, "DHCPv6"),
        }
    }
}

#[derive(Clone)]
pub struct LeaseRepository {
    api: Arc<dyn InventoryApi>,
}

impl LeaseRepository {
    pub fn new(api: Arc<dyn InventoryApi>) -> Self {
        Self { api }
    }

    /// Builds the list query matching `mac` anywhere in the family's lease list.
    pub fn list_params(mac: &str, family: Family) -> ServerListParams {
        ServerListParams {
            attributes: vec![AttributeListParams {
                namespace: DHCP_ATTRIBUTE_NAMESPACE.to_string(),
                keys: vec![family.attribute_key().to_string()],
                operator: Some(Operator::Like),
                value: format!("%{}%", mac),
            }],
        }
    }

    /// Returns every record whose lease list mentions `mac`.
    ///
    /// `mac` must already be normalized. Errors from the inventory service
    /// are returned as they are.
    pub async fn find_records_by_mac(&self, mac: &str, family: Family) -> Result<Vec<Server>> {
        let params = Self::list_params(mac, family);
        debug!("Querying inventory for {} lease of {}", family, mac);
        let records = self.api.list_servers(&params).await?;
        debug!("Inventory returned {} candidate record(s) for {}", records.len(), mac);
        Ok(records)
    }
}
