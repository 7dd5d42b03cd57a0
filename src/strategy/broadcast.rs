use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use super::pending::PendingQuery;
use crate::lock::{lock_ignore_poison, read_ignore_poison, write_ignore_poison};
use crate::protocol::{Message, QueryRequest, QUERY_FIELD, QUERY_RESPONSE_FIELD};
use crate::replier::Reply;
use crate::transport::{create_broadcast_transport, create_broadcast_transport_with_hub};

#[allow(unused_imports)]
use crate::{
    // ---
    log_debug,
    log_error,
    log_info,
    log_trace,
    log_warn,
    BroadcastHub,
    BusError,
    EventCallback,
    NotifyStrategy,
    ReplierRegistry,
    Result,
    SubscriptionHandle,
    TransportPtr,
};

/// Query timeout used when none is configured.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Options for [`BroadcastNotifyStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastOptions {
    /// How long a query waits for its first response.
    ///
    /// Default: 5000 ms
    pub timeout: Duration,
}

impl Default for BroadcastOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl BroadcastOptions {
    /// Set the query timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Options with a timeout given in milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self::default().with_timeout(Duration::from_millis(ms))
    }
}

/// Broadcast events and queries to every other participant on a channel.
///
/// Useful when several independent contexts (tasks, services, tests) need
/// to stay in sync without holding references to each other. To avoid
/// feedback loops, a participant does **not** receive the events it
/// publishes itself.
///
/// Two listeners run for the lifetime of the strategy:
///
/// - the event listener hands every non-protocol envelope to the registered
///   callback;
/// - the responder answers query requests for which the installed registry
///   has a handler. Every participant with a matching handler answers; the
///   caller keeps whichever reply reaches it first.
///
/// Queries are matched to responses by **name only**. Concurrent queries
/// with the same name cannot be told apart: every pending listener for that
/// name accepts the first response that reaches it.
///
/// Must be created inside a Tokio runtime. Dropping the strategy stops its
/// listeners.
pub struct BroadcastNotifyStrategy {
    // ---
    inner: Arc<Inner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

struct Inner {
    transport: TransportPtr,
    options: BroadcastOptions,
    repliers: RwLock<ReplierRegistry>,
    callback: Mutex<Option<EventCallback>>,
    // Tasks awaiting deferred replies; aborted with the listeners.
    replies: Mutex<Vec<JoinHandle<()>>>,
}

impl BroadcastNotifyStrategy {
    /// Join `channel_name` on the process-global hub.
    ///
    /// # Errors
    ///
    /// [`BusError::Transport`] if the name is empty or no Tokio runtime is
    /// running.
    pub fn new(channel_name: &str, options: BroadcastOptions) -> Result<Self> {
        // ---
        Self::with_transport(create_broadcast_transport(channel_name)?, options)
    }

    /// Join `channel_name` on an explicit hub.
    pub fn with_hub(
        channel_name: &str,
        options: BroadcastOptions,
        hub: Arc<BroadcastHub>,
    ) -> Result<Self> {
        // ---
        Self::with_transport(create_broadcast_transport_with_hub(channel_name, hub)?, options)
    }

    /// Run over an existing transport.
    pub fn with_transport(transport: TransportPtr, options: BroadcastOptions) -> Result<Self> {
        // ---
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BusError::Transport(format!("no tokio runtime: {e}")))?;

        // Attach both listeners before returning so nothing posted after
        // construction can be missed.
        let events = transport.subscribe()?;
        let requests = transport.subscribe()?;

        log_debug!(
            "{}: broadcast strategy {} ready (timeout {:?})",
            transport.channel_name(),
            transport.origin(),
            options.timeout
        );

        let inner = Arc::new(Inner {
            transport,
            options,
            repliers: RwLock::new(ReplierRegistry::new()),
            callback: Mutex::new(None),
            replies: Mutex::new(Vec::new()),
        });

        let tasks = vec![
            runtime.spawn(event_loop(inner.clone(), events)),
            runtime.spawn(responder_loop(inner.clone(), requests)),
        ];

        Ok(Self {
            inner,
            tasks: Mutex::new(tasks),
        })
    }

    pub fn options(&self) -> BroadcastOptions {
        self.inner.options
    }

    pub fn channel_name(&self) -> &str {
        self.inner.transport.channel_name()
    }

    /// Stop both listeners and any reply still being computed, then close
    /// the transport.
    ///
    /// Later posts and queries fail with [`BusError::TransportClosed`].
    pub fn close(&self) {
        // ---
        self.abort_listeners();
        self.inner.transport.close();

        log_info!("{}: broadcast strategy closed", self.channel_name());
    }

    fn abort_listeners(&self) {
        for task in lock_ignore_poison(&self.tasks).drain(..) {
            task.abort();
        }
        for task in lock_ignore_poison(&self.inner.replies).drain(..) {
            task.abort();
        }
    }

    /// Number of deferred replies still being computed.
    pub fn pending_replies(&self) -> usize {
        // ---
        let mut replies = lock_ignore_poison(&self.inner.replies);
        replies.retain(|task| !task.is_finished());
        replies.len()
    }
}

impl Drop for BroadcastNotifyStrategy {
    fn drop(&mut self) {
        self.abort_listeners();
    }
}

#[async_trait::async_trait]
impl NotifyStrategy for BroadcastNotifyStrategy {
    // ---
    fn init(&self, repliers: ReplierRegistry) {
        *write_ignore_poison(&self.inner.repliers) = repliers;
    }

    fn notify_subscribers(&self, payload: Value) -> Result<()> {
        // ---
        if payload.get(QUERY_FIELD).is_some() || payload.get(QUERY_RESPONSE_FIELD).is_some() {
            log_warn!(
                "{}: event payload has a protocol field and will not reach peer callbacks",
                self.channel_name()
            );
        }

        let bytes = Message::Event(payload).encode()?;
        self.inner.transport.post(bytes)
    }

    fn on_notify_subscribers(&self, callback: EventCallback) {
        *lock_ignore_poison(&self.inner.callback) = Some(callback);
    }

    async fn query(&self, name: &str, params: Vec<Value>) -> Result<Value> {
        // ---
        let pending = PendingQuery::arm(&self.inner.transport, name, self.inner.options.timeout)?;

        let request = Message::request(name, params).encode()?;
        self.inner.transport.post(request)?;

        log_trace!("{}: query {name} posted", self.channel_name());

        pending.settle().await
    }
}

// Persistent listener feeding the event callback.
async fn event_loop(inner: Arc<Inner>, mut listener: SubscriptionHandle) {
    // ---
    while let Some(env) = listener.recv().await {
        let payload = match Message::decode(&env.payload) {
            Ok(Message::Event(payload)) => payload,
            Ok(_) => continue,
            Err(_err) => {
                log_warn!(
                    "event listener: undecodable envelope from {}: {_err}",
                    env.origin
                );
                continue;
            }
        };

        let callback = lock_ignore_poison(&inner.callback).clone();
        let Some(callback) = callback else {
            log_trace!("event listener: no callback registered");
            continue;
        };

        // A panicking subscriber must not take the listener down with it.
        if panic::catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
            log_error!("event listener: callback panicked");
        }
    }

    log_debug!("event listener stopped");
}

// Persistent listener answering query requests.
async fn responder_loop(inner: Arc<Inner>, mut listener: SubscriptionHandle) {
    // ---
    while let Some(env) = listener.recv().await {
        let request = match Message::decode(&env.payload) {
            Ok(Message::QueryRequest(request)) => request,
            Ok(Message::Malformed(_value)) => {
                log_warn!("responder: malformed protocol envelope: {_value}");
                continue;
            }
            Ok(_) => continue,
            Err(_) => continue,
        };

        inner.answer(request);
    }

    log_debug!("responder stopped");
}

impl Inner {
    fn answer(self: &Arc<Self>, request: QueryRequest) {
        // ---
        let QueryRequest { query, params } = request;

        let replier = read_ignore_poison(&self.repliers).get(&query);
        let Some(replier) = replier else {
            log_trace!("responder: no handler for {query}");
            return;
        };

        // A panicking handler must not take the responder down with it.
        let Ok(outcome) = panic::catch_unwind(AssertUnwindSafe(|| replier.call(params))) else {
            log_error!("responder: handler for {query} panicked");
            return;
        };

        match outcome {
            Ok(Reply::Ready(value)) => self.respond(&query, value),
            Ok(Reply::Deferred(fut)) => {
                let inner = self.clone();
                let task = tokio::spawn(async move {
                    match fut.await {
                        Ok(value) => inner.respond(&query, value),
                        Err(_err) => log_error!("responder: handler for {query} failed: {_err}"),
                    }
                });

                let mut replies = lock_ignore_poison(&self.replies);
                replies.retain(|task| !task.is_finished());
                replies.push(task);
            }
            Err(_err) => {
                log_error!("responder: handler for {query} failed: {_err}");
            }
        }
    }

    fn respond(&self, query: &str, payload: Value) {
        // ---
        let posted = Message::response(query, payload)
            .encode()
            .and_then(|bytes| self.transport.post(bytes));

        if let Err(_err) = posted {
            log_error!("responder: failed to post response to {query}: {_err}");
        }
    }
}
