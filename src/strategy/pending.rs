use std::time::Duration;

use serde_json::Value;
use tokio::time::{self, Instant};

use crate::protocol::Message;
use crate::{log_debug, log_warn, BusError, Result, SubscriptionHandle, TransportPtr};

/// Correlation state for one outstanding broadcast query.
///
/// Owns the deadline and the transient response listener. Both are released
/// when the value is dropped, which happens exactly once: after the first
/// matching response, after the deadline, or when the caller abandons the
/// query future.
///
/// Responses are matched by query name only. Two pending queries with the
/// same name both accept the first response for that name that reaches them.
pub(super) struct PendingQuery {
    // ---
    name: String,
    deadline: Instant,
    listener: SubscriptionHandle,
}

impl PendingQuery {
    /// Start the clock, then attach the response listener.
    ///
    /// The listener must exist before the request is posted so that a fast
    /// responder cannot answer into the void.
    pub(super) fn arm(transport: &TransportPtr, name: &str, timeout: Duration) -> Result<Self> {
        // ---
        let deadline = Instant::now() + timeout;
        let listener = transport.subscribe()?;

        Ok(Self {
            name: name.to_string(),
            deadline,
            listener,
        })
    }

    /// Wait for the first response carrying this query's name.
    ///
    /// Consumes the pending query; the listener is detached on return
    /// whichever way it goes.
    pub(super) async fn settle(mut self) -> Result<Value> {
        // ---
        let deadline = self.deadline;
        let outcome = time::timeout_at(deadline, self.next_match()).await;

        match outcome {
            Ok(Some(payload)) => {
                log_debug!("query {}: response received", self.name);
                Ok(payload)
            }
            Ok(None) => Err(BusError::TransportClosed(format!(
                "channel closed while query {} was pending",
                self.name
            ))),
            Err(_elapsed) => {
                log_debug!("query {}: timed out", self.name);
                Err(BusError::Timeout)
            }
        }
    }

    async fn next_match(&mut self) -> Option<Value> {
        // ---
        while let Some(env) = self.listener.recv().await {
            match Message::decode(&env.payload) {
                Ok(Message::QueryResponse(resp)) if resp.query_response == self.name => {
                    return Some(resp.payload);
                }
                Ok(_) => {}
                Err(_err) => {
                    log_warn!(
                        "query {}: undecodable envelope from {}: {_err}",
                        self.name,
                        env.origin
                    );
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::transport::{create_broadcast_transport_with_hub, BroadcastHub};
    use serde_json::json;

    #[tokio::test]
    async fn test_settles_on_matching_response_only() {
        // ---
        let hub = BroadcastHub::new();
        let caller = create_broadcast_transport_with_hub("pq", hub.clone()).unwrap();
        let peer = create_broadcast_transport_with_hub("pq", hub.clone()).unwrap();

        let pending = PendingQuery::arm(&caller, "sum", Duration::from_secs(1)).unwrap();
        assert_eq!(hub.listener_count("pq"), 1);

        peer.post(Message::response("other", json!(0)).encode().unwrap()).unwrap();
        peer.post(Message::Event(json!("noise")).encode().unwrap()).unwrap();
        peer.post(Message::response("sum", json!(5)).encode().unwrap()).unwrap();

        assert_eq!(pending.settle().await.unwrap(), json!(5));
        assert_eq!(hub.listener_count("pq"), 0);
    }

    #[tokio::test]
    async fn test_deadline_releases_listener() {
        // ---
        let hub = BroadcastHub::new();
        let caller = create_broadcast_transport_with_hub("pq-timeout", hub.clone()).unwrap();

        let pending = PendingQuery::arm(&caller, "sum", Duration::from_millis(20)).unwrap();
        let err = pending.settle().await.unwrap_err();

        assert!(matches!(err, BusError::Timeout));
        assert_eq!(hub.listener_count("pq-timeout"), 0);
    }

    #[tokio::test]
    async fn test_own_response_is_not_seen() {
        // ---
        let hub = BroadcastHub::new();
        let caller = create_broadcast_transport_with_hub("pq-echo", hub).unwrap();

        let pending = PendingQuery::arm(&caller, "sum", Duration::from_millis(30)).unwrap();
        caller.post(Message::response("sum", json!(1)).encode().unwrap()).unwrap();

        assert!(matches!(pending.settle().await, Err(BusError::Timeout)));
    }

    #[tokio::test]
    async fn test_channel_gone_fails_without_waiting() {
        // ---
        let hub = BroadcastHub::new();
        let caller = create_broadcast_transport_with_hub("pq-gone", hub.clone()).unwrap();

        let pending = PendingQuery::arm(&caller, "sum", Duration::from_secs(5)).unwrap();
        drop(caller);

        let started = Instant::now();
        let err = pending.settle().await.unwrap_err();

        assert!(matches!(err, BusError::TransportClosed(_)));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(hub.channel_count(), 0);
    }
}
