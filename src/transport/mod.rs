//! Transport implementations.
//!
//! Concrete implementations of the domain-level `Transport` trait, exposed
//! only through constructor functions. Strategy code depends on
//! `TransportPtr`, never on the concrete types.

mod broadcast;

pub use broadcast::{
    //
    create_broadcast_transport,
    create_broadcast_transport_with_hub,
    global_hub,
    BroadcastHub,
    DEFAULT_CHANNEL_CAPACITY,
};
