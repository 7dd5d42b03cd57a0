//! In-process broadcast transport.
//!
//! Named broadcast channels shared by every transport attached to the same
//! [`BroadcastHub`]. This is the in-process rendition of a platform
//! broadcast primitive (one named channel, many independent participants):
//!
//! - a post is delivered to every other live listener on the same name;
//! - a transport never receives its own posts; the origin stamp on each
//!   envelope is checked by [`SubscriptionHandle`];
//! - posts from one transport arrive in order; there is no ordering across
//!   transports and no acknowledgement;
//! - listeners attached after a post never see it.
//!
//! ## Buffering
//!
//! Each channel name is backed by a bounded Tokio broadcast channel. A
//! listener that falls more than `capacity` envelopes behind loses the
//! oldest ones (logged at warn). That is the "best effort" part of the
//! contract.
//!
//! ## Lifetime
//!
//! A name lives as long as at least one transport is attached to it. Once
//! the last transport is dropped the hub forgets the name, and listeners
//! still holding a [`SubscriptionHandle`] drain what was buffered and then
//! see the channel close. A later transport on that name starts afresh.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::lock::lock_ignore_poison;

#[allow(unused_imports)]
use crate::{
    // ---
    log_debug,
    log_trace,
    BusError,
    Envelope,
    Result,
    SubscriptionHandle,
    Transport,
    TransportBase,
    TransportPtr,
};

/// Per-name buffer used by [`BroadcastHub::new`].
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Registry of named broadcast channels.
///
/// Transports created against the same hub and the same channel name can
/// hear each other. Use a dedicated hub (see
/// [`create_broadcast_transport_with_hub`]) to isolate parallel tests;
/// [`create_broadcast_transport`] uses a process-global one.
pub struct BroadcastHub {
    // ---
    capacity: usize,
    channels: Mutex<HashMap<Arc<str>, Weak<broadcast::Sender<Envelope>>>>,
}

impl BroadcastHub {
    /// Create an empty hub with the default per-name capacity.
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create an empty hub buffering up to `capacity` envelopes per name.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        // ---
        Arc::new(Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        })
    }

    /// Number of listeners currently attached to `name`.
    ///
    /// Counts every live [`SubscriptionHandle`], including persistent
    /// strategy listeners and pending queries.
    pub fn listener_count(&self, name: &str) -> usize {
        // ---
        let channels = lock_ignore_poison(&self.channels);
        channels
            .get(name)
            .and_then(Weak::upgrade)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Number of names with at least one attached transport.
    pub fn channel_count(&self) -> usize {
        // ---
        let channels = lock_ignore_poison(&self.channels);
        channels.values().filter(|tx| tx.strong_count() > 0).count()
    }

    fn sender(&self, name: &Arc<str>) -> Arc<broadcast::Sender<Envelope>> {
        // ---
        let mut channels = lock_ignore_poison(&self.channels);
        channels.retain(|_, tx| tx.strong_count() > 0);

        if let Some(tx) = channels.get(name).and_then(Weak::upgrade) {
            return tx;
        }

        log_debug!("hub: opening channel {name} (capacity {})", self.capacity);

        let tx = Arc::new(broadcast::channel(self.capacity).0);
        channels.insert(name.clone(), Arc::downgrade(&tx));
        tx
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        // ---
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
            channels: Mutex::new(HashMap::new()),
        }
    }
}

/// Process-global hub used by [`create_broadcast_transport`].
static GLOBAL_HUB: OnceLock<Arc<BroadcastHub>> = OnceLock::new();

/// The process-global hub.
pub fn global_hub() -> Arc<BroadcastHub> {
    GLOBAL_HUB.get_or_init(BroadcastHub::new).clone()
}

/// One participant's handle on a named broadcast channel.
struct BroadcastTransport {
    // ---
    base: TransportBase,
    // Shared by every transport on the name; the hub only holds a weak ref.
    sender: Arc<broadcast::Sender<Envelope>>,
    closed: AtomicBool,
}

impl BroadcastTransport {
    fn ensure_open(&self) -> Result<()> {
        // ---
        if self.is_closed() {
            return Err(BusError::TransportClosed(self.channel_name().to_string()));
        }
        Ok(())
    }
}

impl Transport for BroadcastTransport {
    // ---
    fn base(&self) -> &TransportBase {
        &self.base
    }

    fn post(&self, payload: Bytes) -> Result<()> {
        // ---
        self.ensure_open()?;

        let env = Envelope::new(self.origin().clone(), payload);

        // An error only means nobody is listening right now.
        if self.sender.send(env).is_err() {
            log_trace!("{}: post with no listeners", self.channel_name());
        }
        Ok(())
    }

    fn subscribe(&self) -> Result<SubscriptionHandle> {
        // ---
        self.ensure_open()?;

        Ok(SubscriptionHandle::new(
            self.origin().clone(),
            self.base.channel_name.clone(),
            self.sender.subscribe(),
        ))
    }

    fn close(&self) {
        // ---
        if !self.closed.swap(true, Ordering::AcqRel) {
            log_debug!("{}: transport {} closed", self.channel_name(), self.origin());
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Attach a new transport to `channel_name` on the process-global hub.
///
/// # Errors
///
/// [`BusError::Transport`] if `channel_name` is empty.
pub fn create_broadcast_transport(channel_name: &str) -> Result<TransportPtr> {
    // ---
    create_broadcast_transport_with_hub(channel_name, global_hub())
}

/// Attach a new transport to `channel_name` on an explicit hub.
///
/// # Errors
///
/// [`BusError::Transport`] if `channel_name` is empty.
pub fn create_broadcast_transport_with_hub(
    channel_name: &str,
    hub: Arc<BroadcastHub>,
) -> Result<TransportPtr> {
    // ---
    if channel_name.is_empty() {
        return Err(BusError::Transport(
            "broadcast channel name must not be empty".into(),
        ));
    }

    let base = TransportBase::new(channel_name);
    let sender = hub.sender(&base.channel_name);

    log_debug!("{channel_name}: create broadcast transport {}", base.origin);

    Ok(Arc::new(BroadcastTransport {
        base,
        sender,
        closed: AtomicBool::new(false),
    }))
}
