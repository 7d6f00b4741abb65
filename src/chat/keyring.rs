use std::collections::HashMap;

use super::Provider;
use crate::{Error, Result};

pub(crate) const SERVICE_NAME: &str = "figureout";

fn provider_name(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAi => "openai-api",
        Provider::Anthropic => "anthropic-api",
    }
}

fn attributes(provider: Provider) -> HashMap<&'static str, &'static str> {
    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);
    attrs.insert("server", provider_name(provider));
    attrs
}

async fn connect() -> Result<oo7::Keyring> {
    oo7::Keyring::new()
        .await
        .map_err(|e| Error::Keyring(format!("Failed to connect to keyring: {}", e)))
}

/// Store a chat API key in the system keyring, replacing any earlier one.
pub async fn store_api_key(provider: Provider, key: &str) -> Result<()> {
    let keyring = connect().await?;
    keyring
        .create_item(
            &format!("Figure Out {} API Key", provider_name(provider)),
            &attributes(provider),
            key.as_bytes(),
            true,
        )
        .await
        .map_err(|e| Error::Keyring(format!("Failed to store API key: {}", e)))?;
    Ok(())
}

/// Load a chat API key from the system keyring.
pub async fn load_api_key(provider: Provider) -> Result<Option<String>> {
    let keyring = connect().await?;
    let items = keyring
        .search_items(&attributes(provider))
        .await
        .map_err(|e| Error::Keyring(format!("Failed to search keyring: {}", e)))?;

    if let Some(item) = items.first() {
        let secret = item
            .secret()
            .await
            .map_err(|e| Error::Keyring(format!("Failed to read secret: {}", e)))?;
        let key = String::from_utf8(secret.to_vec())
            .map_err(|e| Error::Keyring(format!("Invalid UTF-8 in secret: {}", e)))?;
        if !key.is_empty() {
            return Ok(Some(key));
        }
    }

    Ok(None)
}
