//! Client configuration.

/// Configuration for a [`WorkshopClient`](crate::WorkshopClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Workshop backend, e.g. `https://workshop.example.org/`.
    /// A trailing slash is added if missing.
    pub base_url: String,
}

impl ClientConfig {
    /// Create a configuration pointing at the given backend.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            // Local django development server
            base_url: "http://localhost:8000/".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.base_url.ends_with('/'));
    }
}
