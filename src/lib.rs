//! Typed event channels with pluggable delivery.
//!
//! An [`EventBus`] hands out named [`Channel`]s. A channel carries
//! fire-and-forget events to its subscribers and answers named queries, and
//! it does both through a [`NotifyStrategy`]:
//!
//! - [`LocalNotifyStrategy`] delivers in-line within the current context.
//! - [`BroadcastNotifyStrategy`] delivers over a named broadcast channel to
//!   every *other* participant attached to the same name, and resolves
//!   queries with the first response that arrives before a timeout.
//!
//! Which strategy a bus uses is chosen once with a [`BusConfig`].
//!
//! # Example
//!
//! ```
//! use eventcast::{BusConfig, ChannelSpec, EventBus, Query};
//!
//! struct Sum;
//!
//! impl Query for Sum {
//!     const NAME: &'static str = "sum";
//!     type Params = (i64, i64);
//!     type Output = i64;
//! }
//!
//! struct Math;
//!
//! impl ChannelSpec for Math {
//!     const NAME: &'static str = "math";
//!     type Events = ();
//!     type Queries = (Sum, ());
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> eventcast::Result<()> {
//! let bus = EventBus::new(BusConfig::local())?.register_channel::<Math>();
//! let math = bus.channel::<Math, _>()?;
//!
//! math.reply::<Sum, _>(|(a, b)| Ok(a + b));
//! assert_eq!(math.query::<Sum, _>((2, 3)).await?, 5);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `logging` (default): diagnostics through `tracing`. Without it only
//!   errors are reported, on stderr.

mod macros;
pub(crate) use macros::{log_debug, log_error, log_info, log_trace, log_warn};

mod lock;

mod error;
mod origin;

mod domain;
mod transport;

pub mod protocol;

mod replier;
mod strategy;

mod bus_config;
pub mod capability;
mod channel;
mod event_bus;

pub use error::{BusError, Result};
pub use origin::OriginId;

// --- public re-exports
pub use domain::{
    //
    Envelope,
    SubscriptionHandle,
    Transport,
    TransportBase,
    TransportPtr,
};

pub use transport::{
    //
    create_broadcast_transport,
    create_broadcast_transport_with_hub,
    global_hub,
    BroadcastHub,
    DEFAULT_CHANNEL_CAPACITY,
};

pub use replier::{decode_params, encode_params, BoxFuture, Replier, ReplierRegistry, Reply};

pub use strategy::{
    //
    BroadcastNotifyStrategy,
    BroadcastOptions,
    EventCallback,
    LocalNotifyStrategy,
    NotifyStrategy,
    StrategyPtr,
    DEFAULT_QUERY_TIMEOUT,
};

pub use bus_config::{BusConfig, StrategyKind};
pub use capability::{ChannelSpec, Event, Has, Here, Query, There};
pub use channel::{Channel, SubscriptionId};
pub use event_bus::{EventBus, EVENT_BUS_CHANNEL};
