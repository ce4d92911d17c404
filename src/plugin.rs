//! Plugin entry points for a host DHCP server.
//!
//! The host calls [`setup4`] and/or [`setup6`] once at startup with the
//! plugin's argument list. Both share a single lazily built
//! [`LeaseResolver`], so the inventory client and its token cache exist once
//! per process no matter how many families are enabled.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::handler::{V4Handler, V6Handler};
use crate::resolver::LeaseResolver;

/// Process-wide resolver slot, filled by the first successful setup.
pub struct SharedResolver {
    slot: Mutex<Option<Arc<LeaseResolver>>>,
}

impl SharedResolver {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Returns the stored resolver, building it with `init` if the slot is empty.
    ///
    /// A failed `init` leaves the slot empty so a later call can retry.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<LeaseResolver>>
    where
        F: FnOnce() -> Result<LeaseResolver>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(resolver) = slot.as_ref() {
            return Ok(Arc::clone(resolver));
        }
        let resolver = Arc::new(init()?);
        *slot = Some(Arc::clone(&resolver));
        Ok(resolver)
    }
}

impl Default for SharedResolver {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED: SharedResolver = SharedResolver::new();

fn shared_resolver(config: &Config) -> Result<Arc<LeaseResolver>> {
    SHARED.get_or_try_init(|| LeaseResolver::from_config(config))
}

/// Sets up the DHCPv4 handler. `args` must hold exactly the inventory base URL.
pub fn setup4<S: AsRef<str>>(args: &[S]) -> Result<V4Handler> {
    let config = Config::from_args(args)?;
    let resolver = shared_resolver(&config)?;
    info!("Loaded hollow plugin for DHCPv4.");
    Ok(V4Handler::new(
        LeaseResolver::clone(&resolver),
        config.request_timeout(),
    ))
}

/// Sets up the DHCPv6 handler. `args` must hold exactly the inventory base URL.
pub fn setup6<S: AsRef<str>>(args: &[S]) -> Result<V6Handler> {
    let config = Config::from_args(args)?;
    shared_resolver(&config)?;
    info!("Loaded hollow plugin for DHCPv6.");
    Ok(V6Handler)
}
