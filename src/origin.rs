use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of one transport instance on a broadcast hub.
///
/// Every envelope is stamped with the origin of the transport that posted
/// it. Subscriptions compare it against their own origin to drop self-echo.
///
/// Origins are never used to correlate query responses; queries are
/// matched by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginId(Arc<str>);

impl OriginId {
    /// Generate a new unique origin id.
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    /// Borrow the origin id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OriginId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for OriginId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
