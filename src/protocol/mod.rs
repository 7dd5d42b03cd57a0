//! Wire protocol for the broadcast strategy.
//!
//! Three envelope shapes share one channel: raw event payloads, query
//! requests and query responses. This module encodes them and tells them
//! apart on receipt.

mod message;

pub use message::{Message, QueryRequest, QueryResponse, QUERY_FIELD, QUERY_RESPONSE_FIELD};
