//! # hollowdhcp
//!
//! DHCP lease lookup backed by the hollow inventory service.
//!
//! Leases are not allocated locally. Each server record in the inventory may
//! carry a `sh.hollow.dhcpserver.lease` attribute holding the IPv4 and IPv6
//! leases of its interfaces; a DHCP request is answered by finding the one
//! record whose lease list contains the client's MAC address.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hollowdhcp::{Config, LeaseResolver};
//!
//! #[tokio::main]
//! async fn main() -> hollowdhcp::Result<()> {
//!     let config = Config::from_args(&["https://hollow.example.com/"])?;
//!     let resolver = LeaseResolver::from_config(&config)?;
//!     let resolved = resolver.resolve_v4("aa:bb:cc:dd:ee:ff").await?;
//!     println!("{} -> {}", resolved.hostname, resolved.lease.cidr);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`InventoryClient`] - Authenticated HTTP client for the server list endpoint
//! - [`LeaseRepository`] - Builds the attribute query for a MAC address
//! - [`LeaseResolver`] - Picks exactly one lease out of the candidate records
//! - [`V4Handler`] / [`V6Handler`] - Apply a resolved lease to a DHCP reply
//! - [`plugin`] - `setup4` / `setup6` entry points sharing one resolver

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod inventory;
pub mod lease;
pub mod options;
pub mod packet;
pub mod plugin;
pub mod repository;
pub mod resolver;

pub use auth::Credentials;
pub use client::InventoryClient;
pub use config::Config;
pub use error::{Error, Result};
pub use handler::{V4Handler, V6Handler};
pub use inventory::{InventoryApi, Server, ServerListParams};
pub use lease::{DHCP_ATTRIBUTE_NAMESPACE, LeaseData, V4Lease, V6Lease, normalize_mac};
pub use options::{DhcpOption, MessageType, OptionCode};
pub use packet::DhcpPacket;
pub use plugin::{setup4, setup6};
pub use repository::{Family, LeaseRepository};
pub use resolver::{LeaseResolver, Resolved};
