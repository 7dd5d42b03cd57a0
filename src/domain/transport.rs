// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the broadcast transport interface that notify
//! strategies post to and listen on. It models a named broadcast primitive
//! with exactly three guarantees:
//!
//! - a post reaches every *other* live listener on the same channel name;
//! - a sender never receives its own posts (self-echo suppression);
//! - a single sender's posts arrive in the order they were made.
//!
//! Nothing else is promised: no acknowledgement, no ordering across senders,
//! no persistence for listeners that attach later. Protocol semantics such
//! as query correlation and timeouts live in the strategy layer.
//!
//! Concrete implementations live under `src/transport/`.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

#[allow(unused_imports)]
use crate::{
    // ---
    log_debug,
    log_warn,
    OriginId,
    Result,
};

/// A framed post on a broadcast channel.
///
/// The payload is the JSON encoding of one protocol message. The transport
/// never looks inside it.
#[derive(Clone, Debug)]
pub struct Envelope {
    // ---
    /// Transport instance that posted this envelope.
    pub origin: OriginId,

    /// Opaque payload bytes.
    pub payload: Bytes,
}

impl Envelope {
    /// Create an envelope stamped with `origin`.
    pub fn new(origin: OriginId, payload: impl Into<Bytes>) -> Self {
        // ---
        Self {
            origin,
            payload: payload.into(),
        }
    }
}

/// Shared state embedded by every transport implementation.
///
/// Default [`Transport`] methods delegate here so implementations only
/// provide `base()`.
#[derive(Debug, Clone)]
pub struct TransportBase {
    /// Identity stamped on every post; also used to filter self-echo.
    pub origin: OriginId,
    /// Name of the broadcast channel this transport is attached to.
    pub channel_name: Arc<str>,
}

impl TransportBase {
    /// Create a base with a freshly generated origin.
    pub fn new(channel_name: impl Into<Arc<str>>) -> Self {
        // ---
        Self {
            origin: OriginId::generate(),
            channel_name: channel_name.into(),
        }
    }
}

/// A live listener attached to a broadcast channel.
///
/// Envelopes posted by the owning transport are skipped, so a handle only
/// ever yields envelopes from peers. Dropping the handle detaches the
/// listener.
pub struct SubscriptionHandle {
    // ---
    origin: OriginId,
    channel_name: Arc<str>,
    inbox: broadcast::Receiver<Envelope>,
}

impl SubscriptionHandle {
    /// Wrap a hub receiver for the transport identified by `origin`.
    pub fn new(
        origin: OriginId,
        channel_name: Arc<str>,
        inbox: broadcast::Receiver<Envelope>,
    ) -> Self {
        // ---
        Self {
            origin,
            channel_name,
            inbox,
        }
    }

    /// Wait for the next envelope posted by another transport.
    ///
    /// Returns `None` once the channel is closed. A listener that fell behind
    /// skips what it missed and keeps going.
    pub async fn recv(&mut self) -> Option<Envelope> {
        // ---
        loop {
            match self.inbox.recv().await {
                Ok(env) if env.origin == self.origin => continue,
                Ok(env) => return Some(env),
                Err(RecvError::Lagged(skipped)) => {
                    log_warn!(
                        "{}: listener lagged, {skipped} envelopes dropped",
                        self.channel_name
                    );
                }
                Err(RecvError::Closed) => {
                    log_debug!("{}: channel closed", self.channel_name);
                    return None;
                }
            }
        }
    }
}

/// Broadcast transport abstraction.
///
/// Posting never blocks on listeners. Once `subscribe()` returns, every
/// later post from another transport on the same channel is deliverable to
/// the returned handle.
pub trait Transport: Send + Sync {
    // ---
    /// Returns a reference to the shared base state.
    fn base(&self) -> &TransportBase;

    /// Identity of this transport instance.
    fn origin(&self) -> &OriginId {
        &self.base().origin
    }

    /// Name of the broadcast channel.
    fn channel_name(&self) -> &str {
        &self.base().channel_name
    }

    /// Post a payload to every other listener on the channel.
    ///
    /// Fails with [`BusError::TransportClosed`](crate::BusError::TransportClosed)
    /// after [`close`](Transport::close).
    fn post(&self, payload: Bytes) -> Result<()>;

    /// Attach a new listener.
    fn subscribe(&self) -> Result<SubscriptionHandle>;

    /// Close this transport instance.
    ///
    /// Further posts and subscriptions fail. Listeners already attached are
    /// unaffected until their owners drop them.
    fn close(&self);

    /// Whether [`close`](Transport::close) has been called.
    fn is_closed(&self) -> bool;
}

/// Shared transport pointer.
pub type TransportPtr = Arc<dyn Transport>;
