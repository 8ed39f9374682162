// Serpwatch Infrastructure - HTTP Adapters
// Implements: SerpProvider

mod provider;

pub use provider::{HttpProviderConfig, HttpSerpProvider};
