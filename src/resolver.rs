//! MAC-to-lease resolution.
//!
//! Turns the candidate records of a [`LeaseRepository`] query into exactly
//! one lease and the owning host's name:
//!
//! 1. No candidates: [`Error::NoLeaseFound`].
//! 2. More than one candidate: [`Error::DuplicateLeaseFound`], whether or not
//!    any of them really holds the MAC.
//! 3. One candidate: decode its lease attribute and pick the entry whose MAC
//!    equals the query exactly. A record without the lease attribute, or
//!    without an exact match, is [`Error::NoLeaseFound`].
//!
//! MAC addresses are normalized before both the query and the comparison.
//! Every call is a single attempt; there are no retries.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::client::InventoryClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::lease::{DHCP_ATTRIBUTE_NAMESPACE, LeaseData, V4Lease, V6Lease, normalize_mac};
use crate::repository::{Family, LeaseRepository};

/// A lease together with the hostname of the record that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved<L> {
    pub lease: L,
    pub hostname: String,
}

#[derive(Clone)]
pub struct LeaseResolver {
    repository: LeaseRepository,
}

impl LeaseResolver {
    pub fn new(repository: LeaseRepository) -> Self {
        Self { repository }
    }

    /// Builds a resolver talking to the inventory service described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = InventoryClient::new(
            config.base_url.clone(),
            config.credentials.clone(),
            config.request_timeout(),
        )?;
        Ok(Self::new(LeaseRepository::new(Arc::new(client))))
    }

    pub async fn resolve_v4(&self, mac: &str) -> Result<Resolved<V4Lease>> {
        self.resolve(mac, Family::V4, LeaseData::find_v4).await
    }

    pub async fn resolve_v6(&self, mac: &str) -> Result<Resolved<V6Lease>> {
        self.resolve(mac, Family::V6, LeaseData::find_v6).await
    }

    /// Resolves an IPv4 lease, giving up with [`Error::Timeout`] after `deadline`.
    pub async fn resolve_v4_within(
        &self,
        mac: &str,
        deadline: Duration,
    ) -> Result<Resolved<V4Lease>> {
        tokio::time::timeout(deadline, self.resolve_v4(mac))
            .await
            .map_err(|_| Error::Timeout(deadline))?
    }

    /// Resolves an IPv6 lease, giving up with [`Error::Timeout`] after `deadline`.
    pub async fn resolve_v6_within(
        &self,
        mac: &str,
        deadline: Duration,
    ) -> Result<Resolved<V6Lease>> {
        tokio::time::timeout(deadline, self.resolve_v6(mac))
            .await
            .map_err(|_| Error::Timeout(deadline))?
    }

    async fn resolve<L, F>(&self, mac: &str, family: Family, find: F) -> Result<Resolved<L>>
    where
        L: Clone,
        F: for<'a, 'b> Fn(&'a LeaseData, &'b str) -> Option<&'a L>,
    {
        let mac = normalize_mac(mac);

        let mut records = self.repository.find_records_by_mac(&mac, family).await?;
        let server = match records.len() {
            0 => return Err(Error::NoLeaseFound { mac }),
            1 => records.remove(0),
            count => {
                warn!(
                    "{} records match MAC {}: {}",
                    count,
                    mac,
                    records
                        .iter()
                        .map(|record| record.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                return Err(Error::DuplicateLeaseFound { mac, count });
            }
        };

        let Some(payload) = server.attribute(DHCP_ATTRIBUTE_NAMESPACE) else {
            warn!(
                "Record {} matched MAC {} but has no {} attribute",
                server.name, mac, DHCP_ATTRIBUTE_NAMESPACE
            );
            return Err(Error::NoLeaseFound { mac });
        };

        let data = LeaseData::from_json(payload.get())?;

        let Some(lease) = find(&data, &mac).cloned() else {
            warn!(
                "Record {} matched MAC {} but holds no {} lease for it",
                server.name, mac, family
            );
            return Err(Error::NoLeaseFound { mac });
        };

        info!("Resolved {} lease for {} on {}", family, mac, server.name);

        Ok(Resolved {
            lease,
            hostname: server.name,
        })
    }
}
