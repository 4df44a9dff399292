//! Limiter key namespacing.

/// Prefix applied to every key the limiter writes to its store.
pub const KEY_PREFIX: &str = "rate_limit_";

/// The namespaced store key owned by one limiter.
///
/// Two limiters with different names never share a key, and nothing else in
/// the application should read or write keys carrying [`KEY_PREFIX`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimiterKey {
    /// The action name the limiter was constructed with
    pub name: String,
}

impl LimiterKey {
    /// Create a key for the named action.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// The key under which this limiter's record is stored.
    pub fn to_store_key(&self) -> String {
        format!("{}{}", KEY_PREFIX, self.name)
    }
}

impl std::fmt::Display for LimiterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_store_key())
    }
}
