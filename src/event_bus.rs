//! Event bus: a channel of its own plus lazily created named channels.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use crate::capability::{ChannelSpec, Event, Has, Query};
use crate::channel::ChannelInner;
use crate::lock::lock_ignore_poison;
use crate::{log_debug, BusConfig, Channel, Result};

/// Name of the bus's own channel.
pub const EVENT_BUS_CHANNEL: &str = "eventBus";

struct BusShared {
    // ---
    config: BusConfig,
    channels: Mutex<HashMap<&'static str, Arc<ChannelInner>>>,
}

/// Entry point for application code.
///
/// A bus is itself a channel named [`EVENT_BUS_CHANNEL`] (reachable through
/// `Deref`), and hands out further channels by [`ChannelSpec`]. Each channel
/// is created on first use with a strategy built from the bus's
/// [`BusConfig`] and reused afterwards.
///
/// `CM`, `E` and `Q` are capability sets of channels, events and queries.
/// The `register_*` methods only widen them.
///
/// # Example
///
/// ```
/// use eventcast::{BusConfig, ChannelSpec, Event, EventBus};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct LoggedIn {
///     user: String,
/// }
///
/// impl Event for LoggedIn {
///     const NAME: &'static str = "logged-in";
/// }
///
/// struct Session;
///
/// impl ChannelSpec for Session {
///     const NAME: &'static str = "session";
///     type Events = (LoggedIn, ());
///     type Queries = ();
/// }
///
/// # fn main() -> eventcast::Result<()> {
/// let bus = EventBus::new(BusConfig::local())?.register_channel::<Session>();
///
/// let session = bus.channel::<Session, _>()?;
/// session.subscribe(|ev: LoggedIn| println!("welcome {}", ev.user));
/// session.publish(LoggedIn { user: "sam".into() })?;
/// # Ok(())
/// # }
/// ```
pub struct EventBus<CM = (), E = (), Q = ()> {
    // ---
    bus: Channel<E, Q>,
    shared: Arc<BusShared>,
    _channels: PhantomData<fn() -> CM>,
}

impl EventBus {
    /// Create a bus and its own channel.
    ///
    /// # Errors
    ///
    /// Strategy construction faults; see [`BusConfig::build_strategy`].
    pub fn new(config: BusConfig) -> Result<Self> {
        // ---
        let strategy = config.build_strategy(EVENT_BUS_CHANNEL)?;
        let bus = Channel::from_inner(ChannelInner::new(EVENT_BUS_CHANNEL, strategy));

        log_debug!("event bus created ({config:?})");

        Ok(Self {
            bus,
            shared: Arc::new(BusShared {
                config,
                channels: Mutex::new(HashMap::new()),
            }),
            _channels: PhantomData,
        })
    }
}

impl<CM, E, Q> EventBus<CM, E, Q> {
    /// The channel registered as `C`, created on first call.
    ///
    /// # Errors
    ///
    /// Strategy construction faults on first use.
    pub fn channel<C, I>(&self) -> Result<Channel<C::Events, C::Queries>>
    where
        C: ChannelSpec,
        CM: Has<C, I>,
    {
        // ---
        let mut channels = lock_ignore_poison(&self.shared.channels);

        if let Some(inner) = channels.get(C::NAME) {
            return Ok(Channel::from_inner(inner.clone()));
        }

        let strategy = self.shared.config.build_strategy(C::NAME)?;
        let inner = ChannelInner::new(C::NAME, strategy);
        channels.insert(C::NAME, inner.clone());

        Ok(Channel::from_inner(inner))
    }

    /// Number of named channels created so far (the bus channel excluded).
    pub fn channel_count(&self) -> usize {
        lock_ignore_poison(&self.shared.channels).len()
    }

    pub fn config(&self) -> &BusConfig {
        &self.shared.config
    }

    /// Accept channel `C`. Type-level only.
    pub fn register_channel<C: ChannelSpec>(self) -> EventBus<(C, CM), E, Q> {
        EventBus {
            bus: self.bus,
            shared: self.shared,
            _channels: PhantomData,
        }
    }

    /// Accept event `Ev` on the bus channel. Type-level only.
    pub fn register_events<Ev: Event>(self) -> EventBus<CM, (Ev, E), Q> {
        EventBus {
            bus: self.bus.register_events::<Ev>(),
            shared: self.shared,
            _channels: PhantomData,
        }
    }

    /// Accept query `Qr` on the bus channel. Type-level only.
    pub fn register_queries<Qr: Query>(self) -> EventBus<CM, E, (Qr, Q)> {
        EventBus {
            bus: self.bus.register_queries::<Qr>(),
            shared: self.shared,
            _channels: PhantomData,
        }
    }
}

impl<CM, E, Q> Clone for EventBus<CM, E, Q> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            shared: self.shared.clone(),
            _channels: PhantomData,
        }
    }
}

impl<CM, E, Q> Deref for EventBus<CM, E, Q> {
    type Target = Channel<E, Q>;

    fn deref(&self) -> &Self::Target {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Serialize, Deserialize)]
    struct Tick;

    impl Event for Tick {
        const NAME: &'static str = "tick";
    }

    struct Echo;

    impl Query for Echo {
        const NAME: &'static str = "echo";
        type Params = (String,);
        type Output = String;
    }

    struct Clock;

    impl ChannelSpec for Clock {
        const NAME: &'static str = "clock";
        type Events = (Tick, ());
        type Queries = (Echo, ());
    }

    #[test]
    fn test_channel_is_created_once() {
        // ---
        let bus = EventBus::new(BusConfig::local())
            .unwrap()
            .register_channel::<Clock>();

        assert_eq!(bus.channel_count(), 0);

        let first = bus.channel::<Clock, _>().unwrap();
        let second = bus.channel::<Clock, _>().unwrap();
        assert_eq!(bus.channel_count(), 1);

        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        first.subscribe(move |_: Tick| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        second.publish(Tick).unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bus_is_a_channel() {
        // ---
        let bus = EventBus::new(BusConfig::local())
            .unwrap()
            .register_events::<Tick>();

        assert_eq!(bus.name(), EVENT_BUS_CHANNEL);

        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        bus.subscribe(move |_: Tick| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        bus.publish(Tick).unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bus_queries() {
        // ---
        let bus = EventBus::new(BusConfig::local())
            .unwrap()
            .register_queries::<Echo>();

        bus.reply::<Echo, _>(|(s,)| Ok(s.to_uppercase()));
        assert_eq!(bus.query::<Echo, _>(("hey".into(),)).await.unwrap(), "HEY");
    }

    #[test]
    fn test_bus_channel_and_named_channels_are_separate() {
        // ---
        let bus = EventBus::new(BusConfig::local())
            .unwrap()
            .register_events::<Tick>()
            .register_channel::<Clock>();

        let clock = bus.channel::<Clock, _>().unwrap();
        clock.subscribe(|_: Tick| panic!("bus events must not leak into clock"));
        bus.publish(Tick).unwrap();
    }
}
