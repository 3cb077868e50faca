//! Response service clients for turnwise.
//!
//! All providers implement the `turnwise_core::Provider` trait.

pub mod documents;
pub mod responses;
pub mod sse;

pub use documents::{StoreFile, VectorStore};
pub use responses::{OPENAI_BASE_URL, ResponsesProvider, parse_response};

use turnwise_config::AppConfig;
use turnwise_core::error::ProviderError;

/// Build the provider described by the configuration.
pub fn build_from_config(config: &AppConfig) -> Result<ResponsesProvider, ProviderError> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            ProviderError::NotConfigured(
                "no API key (set TURNWISE_API_KEY or OPENAI_API_KEY, or run `turnwise onboard`)"
                    .into(),
            )
        })?;

    let base_url = config.base_url.trim_end_matches('/');
    let name = if base_url == OPENAI_BASE_URL {
        "openai"
    } else {
        "custom"
    };
    Ok(ResponsesProvider::new(name, base_url, api_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnwise_core::Provider;

    #[test]
    fn requires_api_key() {
        let config = AppConfig::default();
        assert!(matches!(
            build_from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn names_custom_endpoints() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-test".into());
        assert_eq!(build_from_config(&config).unwrap().name(), "openai");

        config.base_url = "http://localhost:11434/v1".into();
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "custom");
        assert_eq!(provider.base_url(), "http://localhost:11434/v1");
    }
}
