use std::sync::Arc;
use tracing::warn;

use crate::storage::KeyValueStore;

pub const TOKEN_KEY: &str = "token";

/// Source of the bearer credential sent with every sweep.
pub trait TokenStore: Send + Sync {
    fn get_token(&self) -> Option<String>;
}

/// A token fixed at startup, e.g. from the environment.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.trim().is_empty()))
    }
}

impl TokenStore for StaticToken {
    fn get_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Token kept in the session key-value store, read on every call so a
/// login from elsewhere is picked up.
pub struct StoredToken {
    store: Arc<dyn KeyValueStore>,
}

impl StoredToken {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

impl TokenStore for StoredToken {
    fn get_token(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("Failed to read token: {}", e);
                None
            }
        }
    }
}

/// First token source that yields a value wins.
pub struct ChainedTokens(pub Vec<Arc<dyn TokenStore>>);

impl TokenStore for ChainedTokens {
    fn get_token(&self) -> Option<String> {
        self.0.iter().find_map(|s| s.get_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_static_token_ignores_blank() {
        assert_eq!(StaticToken::new(Some("  ".to_string())).get_token(), None);
        assert_eq!(
            StaticToken::new(Some("abc".to_string())).get_token().as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn test_stored_token_read_each_time() {
        let kv = Arc::new(MemoryStore::new());
        let tokens = StoredToken::new(kv.clone());
        assert_eq!(tokens.get_token(), None);

        kv.set(TOKEN_KEY, "jwt-1").unwrap();
        assert_eq!(tokens.get_token().as_deref(), Some("jwt-1"));
    }

    #[test]
    fn test_chained_tokens_prefer_first() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(TOKEN_KEY, "stored").unwrap();

        let sources: Vec<Arc<dyn TokenStore>> = vec![
            Arc::new(StaticToken::new(None)),
            Arc::new(StoredToken::new(kv)),
            Arc::new(StaticToken::new(Some("env".to_string()))),
        ];
        let chained = ChainedTokens(sources);
        assert_eq!(chained.get_token().as_deref(), Some("stored"));
    }
}
