use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Field whose presence marks a query request.
pub const QUERY_FIELD: &str = "query";

/// Field whose presence marks a query response.
pub const QUERY_RESPONSE_FIELD: &str = "queryResponse";

/// `{ "query": name, "params": [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

/// `{ "queryResponse": name, "payload": value }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(rename = "queryResponse")]
    pub query_response: String,
    #[serde(default)]
    pub payload: Value,
}

/// One decoded broadcast post.
///
/// Kinds are told apart by shape only: an object carrying `queryResponse`
/// is a response, an object carrying `query` is a request, anything else
/// is an event payload delivered as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Event(Value),
    QueryRequest(QueryRequest),
    QueryResponse(QueryResponse),
    /// Carries a protocol field but does not fit its envelope.
    ///
    /// Never treated as an event.
    Malformed(Value),
}

impl Message {
    /// Classify a decoded JSON value.
    pub fn classify(value: Value) -> Self {
        // ---
        let kind = match &value {
            Value::Object(map) if map.contains_key(QUERY_RESPONSE_FIELD) => Kind::Response,
            Value::Object(map) if map.contains_key(QUERY_FIELD) => Kind::Request,
            _ => Kind::Event,
        };

        match kind {
            Kind::Event => Message::Event(value),
            Kind::Request => match QueryRequest::deserialize(&value) {
                Ok(req) => Message::QueryRequest(req),
                Err(_) => Message::Malformed(value),
            },
            Kind::Response => match QueryResponse::deserialize(&value) {
                Ok(resp) => Message::QueryResponse(resp),
                Err(_) => Message::Malformed(value),
            },
        }
    }

    /// Decode and classify a wire payload.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        // ---
        let value: Value = serde_json::from_slice(bytes)?;
        Ok(Self::classify(value))
    }

    /// Encode for posting.
    pub fn encode(&self) -> Result<Bytes> {
        // ---
        let bytes = match self {
            Message::Event(v) | Message::Malformed(v) => serde_json::to_vec(v)?,
            Message::QueryRequest(req) => serde_json::to_vec(req)?,
            Message::QueryResponse(resp) => serde_json::to_vec(resp)?,
        };
        Ok(Bytes::from(bytes))
    }

    pub fn request(query: impl Into<String>, params: Vec<Value>) -> Self {
        Message::QueryRequest(QueryRequest {
            query: query.into(),
            params,
        })
    }

    pub fn response(query: impl Into<String>, payload: Value) -> Self {
        Message::QueryResponse(QueryResponse {
            query_response: query.into(),
            payload,
        })
    }

    /// The query name this message answers, if it is a response.
    pub fn response_to(&self) -> Option<&str> {
        match self {
            Message::QueryResponse(resp) => Some(&resp.query_response),
            _ => None,
        }
    }
}

enum Kind {
    Event,
    Request,
    Response,
}
