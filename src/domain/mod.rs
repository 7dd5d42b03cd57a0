//! Domain layer public interface.
//!
//! Transport-independent abstractions shared by the strategy layer and the
//! concrete transports. Consumers import through this module rather than
//! reaching into individual files.

mod transport;

pub use transport::{
    //
    Envelope,
    SubscriptionHandle,
    Transport,
    TransportBase,
    TransportPtr,
};
