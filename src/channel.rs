//! Typed channels.
//!
//! A [`Channel`] owns one notify strategy and turns its single event
//! callback into many subscriptions, filtered by event name. It also owns the
//! channel's replier registry and re-installs it on the strategy whenever a
//! handler is added.
//!
//! On the wire a channel event is the strategy payload
//! `{ "event": NAME, "data": ... }`.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::{Event, Has, Query};
use crate::lock::lock_ignore_poison;
use crate::replier::encode_params;

#[allow(unused_imports)]
use crate::{
    // ---
    log_debug,
    log_trace,
    log_warn,
    EventCallback,
    ReplierRegistry,
    Result,
    StrategyPtr,
};

/// Handle returned by [`Channel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Serialize, Deserialize)]
struct ChannelEvent {
    event: String,
    #[serde(default)]
    data: Value,
}

struct Subscriber {
    id: SubscriptionId,
    event: &'static str,
    callback: EventCallback,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<Subscriber>,
}

/// Runtime state shared by every typed view of one channel.
pub(crate) struct ChannelInner {
    // ---
    name: String,
    strategy: StrategyPtr,
    subscribers: Arc<Mutex<Subscribers>>,
    repliers: Mutex<ReplierRegistry>,
}

impl ChannelInner {
    pub(crate) fn new(name: impl Into<String>, strategy: StrategyPtr) -> Arc<Self> {
        // ---
        let name = name.into();
        let subscribers = Arc::new(Mutex::new(Subscribers::default()));

        let fanout = subscribers.clone();
        let channel = name.clone();
        strategy.on_notify_subscribers(Arc::new(move |payload| {
            dispatch(&channel, &fanout, payload);
        }));
        strategy.init(ReplierRegistry::new());

        log_debug!("channel {name}: created");

        Arc::new(Self {
            name,
            strategy,
            subscribers,
            repliers: Mutex::new(ReplierRegistry::new()),
        })
    }

    fn install(&self, update: impl FnOnce(&mut ReplierRegistry)) {
        // ---
        let mut repliers = lock_ignore_poison(&self.repliers);
        update(&mut repliers);
        self.strategy.init(repliers.clone());
    }
}

fn dispatch(channel: &str, subscribers: &Mutex<Subscribers>, payload: Value) {
    // ---
    let event: ChannelEvent = match serde_json::from_value(payload) {
        Ok(event) => event,
        Err(_err) => {
            log_debug!("channel {channel}: ignoring foreign payload: {_err}");
            return;
        }
    };

    // Snapshot first: callbacks may subscribe or publish re-entrantly.
    let targets: Vec<EventCallback> = lock_ignore_poison(subscribers)
        .entries
        .iter()
        .filter(|s| s.event == event.event)
        .map(|s| s.callback.clone())
        .collect();

    if targets.is_empty() {
        log_trace!("channel {channel}: no subscribers for {}", event.event);
    }

    for callback in targets {
        callback(event.data.clone());
    }
}

/// A named channel accepting events `E` and queries `Q`.
///
/// `E` and `Q` are capability sets (see [`capability`](crate::capability));
/// a fresh channel accepts nothing until widened with
/// [`register_events`](Channel::register_events) and
/// [`register_queries`](Channel::register_queries). Clones and widened
/// handles share the same runtime state.
///
/// # Example
///
/// ```
/// use eventcast::{Channel, Event, LocalNotifyStrategy};
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
///
/// #[derive(Serialize, Deserialize)]
/// struct Ping;
///
/// impl Event for Ping {
///     const NAME: &'static str = "ping";
/// }
///
/// let channel = Channel::new("demo", Arc::new(LocalNotifyStrategy::new()))
///     .register_events::<Ping>();
///
/// channel.subscribe(|_: Ping| println!("pong"));
/// channel.publish(Ping).unwrap();
/// ```
pub struct Channel<E = (), Q = ()> {
    // ---
    inner: Arc<ChannelInner>,
    _caps: PhantomData<fn() -> (E, Q)>,
}

impl<E, Q> Clone for Channel<E, Q> {
    fn clone(&self) -> Self {
        Self::from_inner(self.inner.clone())
    }
}

impl Channel {
    /// Create a channel over `strategy` accepting nothing yet.
    ///
    /// The channel takes over the strategy's event callback and replier
    /// registry.
    pub fn new(name: impl Into<String>, strategy: StrategyPtr) -> Self {
        Self::from_inner(ChannelInner::new(name, strategy))
    }
}

impl<E, Q> Channel<E, Q> {
    pub(crate) fn from_inner(inner: Arc<ChannelInner>) -> Self {
        Self {
            inner,
            _caps: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The strategy this channel runs on.
    pub fn strategy(&self) -> &StrategyPtr {
        &self.inner.strategy
    }

    /// Accept `Ev` as well. Type-level only.
    pub fn register_events<Ev: Event>(self) -> Channel<(Ev, E), Q> {
        Channel::from_inner(self.inner)
    }

    /// Accept `Qr` as well. Type-level only.
    pub fn register_queries<Qr: Query>(self) -> Channel<E, (Qr, Q)> {
        Channel::from_inner(self.inner)
    }

    /// Call `callback` for every `Ev` this channel receives.
    ///
    /// Payloads that do not decode as `Ev` are skipped with a warning.
    pub fn subscribe<Ev, I>(&self, callback: impl Fn(Ev) + Send + Sync + 'static) -> SubscriptionId
    where
        Ev: Event,
        E: Has<Ev, I>,
    {
        // ---
        let channel = self.inner.name.clone();
        let erased: EventCallback = Arc::new(move |data| match serde_json::from_value::<Ev>(data) {
            Ok(event) => callback(event),
            Err(_err) => log_warn!("channel {channel}: bad {} payload: {_err}", Ev::NAME),
        });

        let mut subscribers = lock_ignore_poison(&self.inner.subscribers);
        let id = SubscriptionId(subscribers.next_id);
        subscribers.next_id += 1;
        subscribers.entries.push(Subscriber {
            id,
            event: Ev::NAME,
            callback: erased,
        });
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        // ---
        let mut subscribers = lock_ignore_poison(&self.inner.subscribers);
        let before = subscribers.entries.len();
        subscribers.entries.retain(|s| s.id != id);
        subscribers.entries.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        lock_ignore_poison(&self.inner.subscribers).entries.len()
    }

    /// Publish `event` through the strategy.
    pub fn publish<Ev, I>(&self, event: Ev) -> Result<()>
    where
        Ev: Event,
        E: Has<Ev, I>,
    {
        // ---
        let payload = serde_json::to_value(ChannelEvent {
            event: Ev::NAME.to_string(),
            data: serde_json::to_value(event)?,
        })?;
        self.inner.strategy.notify_subscribers(payload)
    }

    /// Answer `Qr` with a synchronous handler.
    ///
    /// Replaces any previous handler for `Qr` on this channel.
    pub fn reply<Qr, I>(
        &self,
        handler: impl Fn(Qr::Params) -> Result<Qr::Output> + Send + Sync + 'static,
    ) where
        Qr: Query,
        Q: Has<Qr, I>,
    {
        self.inner.install(|repliers| {
            repliers.register_fn(Qr::NAME, handler);
        });
    }

    /// Answer `Qr` with a handler returning a future.
    pub fn reply_async<Qr, I, Fut>(&self, handler: impl Fn(Qr::Params) -> Fut + Send + Sync + 'static)
    where
        Qr: Query,
        Q: Has<Qr, I>,
        Fut: std::future::Future<Output = Result<Qr::Output>> + Send + 'static,
    {
        self.inner.install(|repliers| {
            repliers.register_async(Qr::NAME, handler);
        });
    }

    /// Issue `Qr` and decode its answer.
    pub async fn query<Qr, I>(&self, params: Qr::Params) -> Result<Qr::Output>
    where
        Qr: Query,
        Q: Has<Qr, I>,
    {
        // ---
        let params = encode_params(&params)?;
        let value = self.inner.strategy.query(Qr::NAME, params).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{BusError, LocalNotifyStrategy};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        seq: u32,
    }

    impl Event for Ping {
        const NAME: &'static str = "ping";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Pong;

    impl Event for Pong {
        const NAME: &'static str = "pong";
    }

    struct Sum;

    impl Query for Sum {
        const NAME: &'static str = "sum";
        type Params = (i64, i64);
        type Output = i64;
    }

    fn local() -> Channel<(Pong, (Ping, ())), (Sum, ())> {
        Channel::new("test", Arc::new(LocalNotifyStrategy::new()))
            .register_events::<Ping>()
            .register_events::<Pong>()
            .register_queries::<Sum>()
    }

    #[test]
    fn test_fanout_filters_by_event_name() {
        // ---
        let channel = local();
        let pings = Arc::new(AtomicUsize::new(0));
        let pongs = Arc::new(AtomicUsize::new(0));

        let p = pings.clone();
        channel.subscribe(move |ping: Ping| {
            assert_eq!(ping.seq, 7);
            p.fetch_add(1, Ordering::SeqCst);
        });
        let p = pings.clone();
        channel.subscribe(move |_: Ping| {
            p.fetch_add(1, Ordering::SeqCst);
        });
        let q = pongs.clone();
        channel.subscribe(move |_: Pong| {
            q.fetch_add(1, Ordering::SeqCst);
        });

        channel.publish(Ping { seq: 7 }).unwrap();

        assert_eq!(pings.load(Ordering::SeqCst), 2);
        assert_eq!(pongs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe() {
        // ---
        let channel = local();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let id = channel.subscribe(move |_: Pong| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(channel.subscriber_count(), 1);
        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));

        channel.publish(Pong).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_foreign_payload_is_ignored() {
        // ---
        let channel = local();
        channel.subscribe(|_: Ping| panic!("must not be called"));
        channel
            .strategy()
            .notify_subscribers(serde_json::json!({ "type": "ping" }))
            .unwrap();
    }

    #[tokio::test]
    async fn test_reply_and_query() {
        // ---
        let channel = local();
        channel.reply::<Sum, _>(|(a, b)| Ok(a + b));

        let sum = channel.query::<Sum, _>((2, 3)).await.unwrap();
        assert_eq!(sum, 5);
    }

    #[tokio::test]
    async fn test_query_without_reply_is_missing_handler() {
        // ---
        let channel = local();
        let err = channel.query::<Sum, _>((2, 3)).await.unwrap_err();
        assert!(matches!(err, BusError::MissingHandler(name) if name == "sum"));
    }

    #[tokio::test]
    async fn test_widened_handles_share_state() {
        // ---
        let base = Channel::new("shared", Arc::new(LocalNotifyStrategy::new()));
        let with_query = base.clone().register_queries::<Sum>();
        with_query.reply_async::<Sum, _, _>(|(a, b)| async move { Ok(a * b) });

        let again = base.register_queries::<Sum>();
        assert_eq!(again.query::<Sum, _>((4, 5)).await.unwrap(), 20);
    }
}
