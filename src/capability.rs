//! Compile-time capability sets.
//!
//! Channels and buses carry the events, queries and sub-channels they accept
//! as type parameters. A capability set is a type-level list built from
//! nested pairs and terminated by `()`:
//!
//! ```text
//! ()                       nothing registered
//! (Ping, ())               one event
//! (Pong, (Ping, ()))       two events, most recent first
//! ```
//!
//! [`Has<T, I>`] proves that `T` is somewhere in the list. The index `I`
//! ([`Here`] or [`There<I>`]) is always inferred; callers write `_` when a
//! turbofish is needed. Registering the same type twice makes the index
//! ambiguous and is rejected at the call site.
//!
//! None of this exists at runtime. Widening a handle only changes its type.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Index: the wanted type is the head of the list.
pub enum Here {}

/// Index: the wanted type is somewhere in the tail.
pub struct There<I>(PhantomData<I>);

/// Type-level membership: `Self` contains `T` at index `I`.
pub trait Has<T, I> {}

impl<T, Tail> Has<T, Here> for (T, Tail) {}

impl<T, Head, Tail, I> Has<T, There<I>> for (Head, Tail) where Tail: Has<T, I> {}

/// An event that can be published on a channel.
///
/// ```
/// use eventcast::Event;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Ping {
///     seq: u32,
/// }
///
/// impl Event for Ping {
///     const NAME: &'static str = "ping";
/// }
/// ```
pub trait Event: Serialize + DeserializeOwned + Send + 'static {
    /// Name used on the wire; unique within a channel.
    const NAME: &'static str;
}

/// A named request/response call.
///
/// `Params` is sent as a positional list: tuples map element by element,
/// `()` is an empty list and any other value is a single argument.
pub trait Query: 'static {
    /// Name used on the wire; unique within a channel.
    const NAME: &'static str;
    type Params: Serialize + DeserializeOwned + Send + 'static;
    type Output: Serialize + DeserializeOwned + Send + 'static;
}

/// A named channel and what it carries.
pub trait ChannelSpec: 'static {
    /// Channel name; also the broadcast transport name.
    const NAME: &'static str;
    /// Event capability set, e.g. `(Ping, (Pong, ()))`.
    type Events: 'static;
    /// Query capability set.
    type Queries: 'static;
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    struct A;
    struct B;
    struct C;

    fn assert_has<L: Has<T, I>, T, I>() {}

    #[test]
    fn test_membership_is_inferred() {
        // ---
        assert_has::<(A, ()), A, _>();
        assert_has::<(B, (A, ())), A, _>();
        assert_has::<(C, (B, (A, ()))), A, _>();
        assert_has::<(C, (B, (A, ()))), C, _>();
    }
}
