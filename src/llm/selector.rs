use crate::config::CiforgeConfig;
use crate::llm::{GenAIClient, LLMClient};
use genai::adapter::AdapterKind;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SelectedClient {
    pub client: Arc<dyn LLMClient>,
    pub provider: AdapterKind,
    pub description: String,
}

impl std::fmt::Debug for SelectedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedClient")
            .field("provider", &self.provider)
            .field("description", &self.description)
            .finish()
    }
}

/// Builds the override client, or `None` when the phase is not configured.
///
/// Both a model name and the provider's credential must be present. Ollama
/// has no key, so it additionally requires an explicit `OLLAMA_HOST`.
pub fn select_override_client(config: &CiforgeConfig) -> Option<SelectedClient> {
    let Some(model) = config.override_model.clone() else {
        debug!("Override model not configured");
        return None;
    };

    let provider = match config.override_adapter() {
        Ok(provider) => provider,
        Err(e) => {
            warn!("Override disabled: {}", e);
            return None;
        }
    };

    let mut endpoint = config.override_base_url.clone();
    if provider == AdapterKind::Ollama {
        match std::env::var("OLLAMA_HOST").ok().filter(|h| !h.is_empty()) {
            Some(host) => {
                endpoint = endpoint.or_else(|| Some(normalize_ollama_host(&host)));
            }
            None => {
                debug!("Skipping Ollama override - OLLAMA_HOST not set");
                return None;
            }
        }
    } else if !provider_has_credentials(provider) {
        debug!("Skipping {} override - no credentials available", provider);
        return None;
    }

    let client = GenAIClient::new(provider, model.clone(), config.request_timeout(), endpoint);
    info!("Override model enabled: {} ({})", provider, model);

    Some(SelectedClient {
        client: Arc::new(client),
        provider,
        description: format!("{} ({})", provider, model),
    })
}

fn provider_has_credentials(provider: AdapterKind) -> bool {
    match provider.default_key_env_name() {
        None => true,
        Some(env_var) => std::env::var(env_var).map(|v| !v.is_empty()).unwrap_or(false),
    }
}

fn normalize_ollama_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    let base = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };
    format!("{}/", base)
}
