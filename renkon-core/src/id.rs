//! Namespaced string identifiers.
//!
//! `Identifier<N>` wraps a `String` tagged, at the type level, with a
//! namespace marker `N`. Two identifiers only compile-compare if they share
//! a namespace, which is a stronger guarantee than the "namespace tag +
//! string" runtime equality `spec.md` describes: an `Identifier<Action>`
//! and an `Identifier<Endpoint>` simply cannot be compared by the type
//! checker, so there is no way to accidentally look up an endpoint id in a
//! table keyed by action ids.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A namespace marker type. Implemented by the zero-sized tag structs below;
/// never implemented by user code.
pub trait Namespace {
    /// Human-readable tag used in `Debug`/`Display` output and error text.
    const TAG: &'static str;
}

macro_rules! namespace {
    ($name:ident, $tag:literal) => {
        #[doc = concat!("Namespace marker for `", $tag, "` identifiers.")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name;

        impl Namespace for $name {
            const TAG: &'static str = $tag;
        }
    };
}

namespace!(ActionNs, "Action");
namespace!(EndpointNs, "Endpoint");
namespace!(ResponseNs, "Response");
namespace!(ScenarioNs, "Scenario");
namespace!(SessionNs, "Session");

/// A namespaced string identifier.
///
/// ```
/// use renkon_core::id::{ActionId, EndpointId};
///
/// let a = ActionId::new("wait");
/// let b = ActionId::new("wait");
/// assert_eq!(a, b);
///
/// let e = EndpointId::new("wait"); // different namespace, different type
/// assert_eq!(e.as_str(), a.as_str());
/// ```
pub struct Identifier<N> {
    value: String,
    _ns: PhantomData<N>,
}

impl<N: Namespace> Identifier<N> {
    /// Construct an identifier from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _ns: PhantomData,
        }
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Consume and return the underlying string.
    pub fn into_string(self) -> String {
        self.value
    }

    /// The namespace tag for this identifier's type.
    pub fn namespace(&self) -> &'static str {
        N::TAG
    }
}

impl<N> Clone for Identifier<N> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _ns: PhantomData,
        }
    }
}

impl<N> PartialEq for Identifier<N> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<N> Eq for Identifier<N> {}

impl<N> Hash for Identifier<N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<N: Namespace> fmt::Debug for Identifier<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", N::TAG, self.value)
    }
}

impl<N: Namespace> fmt::Display for Identifier<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<N> AsRef<str> for Identifier<N> {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl<N: Namespace> From<&str> for Identifier<N> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<N: Namespace> From<String> for Identifier<N> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identifier of an [`Action`](crate::action::Action) type.
pub type ActionId = Identifier<ActionNs>;
/// Identifier of an [`Endpoint`](crate::endpoint::Endpoint).
pub type EndpointId = Identifier<EndpointNs>;
/// Identifier of a response on an endpoint's response table.
pub type ResponseId = Identifier<ResponseNs>;
/// Identifier of a [`Scenario`](crate::scenario::Scenario).
pub type ScenarioId = Identifier<ScenarioNs>;
/// Identifier of a [`Session`](crate::session::SessionIdentifier).
pub type SessionId = Identifier<SessionNs>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_iff_namespace_and_string_match() {
        assert_eq!(ActionId::new("wait"), ActionId::new("wait"));
        assert_ne!(ActionId::new("wait"), ActionId::new("return-response"));
    }

    #[test]
    fn display_round_trips_the_string() {
        let id = EndpointId::new("GET-/accounts");
        assert_eq!(id.as_str(), "GET-/accounts");
        assert_eq!(id.to_string(), "GET-/accounts");
    }

    #[test]
    fn namespace_tag_matches_marker() {
        assert_eq!(ScenarioId::new("x").namespace(), "Scenario");
        assert_eq!(SessionId::new("x").namespace(), "Session");
    }
}
