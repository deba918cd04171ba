//! Credential source for transport requests.

/// Supplies the bearer token attached to each request.
///
/// Called once per request so implementations may rotate tokens.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Anonymous requests.
pub struct NoToken;

impl TokenProvider for NoToken {
    fn token(&self) -> Option<String> {
        None
    }
}

/// A fixed token supplied at startup.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}
