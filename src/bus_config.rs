//! Strategy selection for an [`EventBus`](crate::EventBus).
//!
//! Every channel a bus creates gets its own strategy instance built from the
//! same `BusConfig`. For the broadcast strategy the channel name doubles as
//! the broadcast transport name, so buses in different contexts that share a
//! hub and a channel name talk to each other.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::transport::global_hub;
use crate::{
    // ---
    BroadcastHub,
    BroadcastNotifyStrategy,
    BroadcastOptions,
    LocalNotifyStrategy,
    Result,
    StrategyPtr,
};

/// Which strategy a bus builds for its channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// In-line delivery inside the current context.
    Local,
    /// Delivery to every other participant on the same channel name.
    Broadcast(BroadcastOptions),
}

/// Shared strategy configuration.
///
/// # Example
///
/// ```
/// use eventcast::BusConfig;
/// use std::time::Duration;
///
/// let config = BusConfig::broadcast().with_timeout(Duration::from_millis(500));
/// ```
#[derive(Clone)]
pub struct BusConfig {
    // ---
    /// Strategy built for each channel.
    ///
    /// Default: [`StrategyKind::Local`]
    pub strategy: StrategyKind,

    /// Hub used by broadcast strategies; the process-global hub when `None`.
    pub hub: Option<Arc<BroadcastHub>>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::local()
    }
}

impl BusConfig {
    /// In-line delivery within this context.
    pub fn local() -> Self {
        Self {
            strategy: StrategyKind::Local,
            hub: None,
        }
    }

    /// Broadcast delivery with the default 5000 ms query timeout.
    pub fn broadcast() -> Self {
        Self {
            strategy: StrategyKind::Broadcast(BroadcastOptions::default()),
            hub: None,
        }
    }

    /// Set the broadcast query timeout.
    ///
    /// Has no effect on the local strategy, which never waits.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let StrategyKind::Broadcast(options) = &mut self.strategy {
            options.timeout = timeout;
        }
        self
    }

    /// Attach broadcast strategies to an explicit hub.
    pub fn with_hub(mut self, hub: Arc<BroadcastHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Build a fresh strategy for `channel_name`.
    ///
    /// # Errors
    ///
    /// Broadcast construction faults (empty name, no Tokio runtime).
    pub fn build_strategy(&self, channel_name: &str) -> Result<StrategyPtr> {
        // ---
        match self.strategy {
            StrategyKind::Local => Ok(Arc::new(LocalNotifyStrategy::new())),
            StrategyKind::Broadcast(options) => {
                let hub = self.hub.clone().unwrap_or_else(global_hub);
                let strategy = BroadcastNotifyStrategy::with_hub(channel_name, options, hub)?;
                Ok(Arc::new(strategy))
            }
        }
    }
}

impl fmt::Debug for BusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusConfig")
            .field("strategy", &self.strategy)
            .field("dedicated_hub", &self.hub.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_default_is_local() {
        // ---
        assert_eq!(BusConfig::default().strategy, StrategyKind::Local);
    }

    #[test]
    fn test_timeout_only_applies_to_broadcast() {
        // ---
        let local = BusConfig::local().with_timeout(Duration::from_millis(10));
        assert_eq!(local.strategy, StrategyKind::Local);

        let broadcast = BusConfig::broadcast().with_timeout(Duration::from_millis(10));
        assert_eq!(
            broadcast.strategy,
            StrategyKind::Broadcast(BroadcastOptions::from_millis(10))
        );
    }

    #[test]
    fn test_local_builds_without_runtime() {
        // ---
        assert!(BusConfig::local().build_strategy("anything").is_ok());
    }

    #[test]
    fn test_broadcast_needs_runtime() {
        // ---
        let config = BusConfig::broadcast().with_hub(BroadcastHub::new());
        assert!(config.build_strategy("no-runtime").is_err());
    }
}
