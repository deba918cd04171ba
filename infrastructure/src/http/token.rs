//! Token provider reading the environment on every request.

use murmur_application::TokenProvider;

/// Reads the bearer token from an environment variable per request, so a
/// rotated token is picked up without restarting.
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    variable: String,
}

impl EnvTokenProvider {
    pub const DEFAULT_VARIABLE: &'static str = "MURMUR_TOKEN";

    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VARIABLE)
    }
}

impl TokenProvider for EnvTokenProvider {
    fn token(&self) -> Option<String> {
        std::env::var(&self.variable)
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }
}
