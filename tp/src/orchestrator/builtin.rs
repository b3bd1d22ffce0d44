//! Built-in provider registration from configuration

use std::sync::Arc;

use eyre::{Context, Result};
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::DataFreshness;
use crate::llm;
use crate::provider::{
    Capability, FixtureInventoryProvider, LlmItineraryProvider, ProviderDescriptor, ProviderRegistry,
    TemplateItineraryProvider,
};

pub const TEMPLATE_PROVIDER_ID: &str = "template";
pub const LLM_PROVIDER_ID: &str = "llm";
pub const FIXTURE_PROVIDER_ID: &str = "fixture";

/// Register the template, LLM and fixture providers the config enables
pub fn register_builtin_providers(registry: &ProviderRegistry, config: &Config) -> Result<()> {
    debug!("register_builtin_providers: called");
    let template = &config.providers.template;
    registry.register_generative(
        ProviderDescriptor::new(
            TEMPLATE_PROVIDER_ID,
            vec![Capability::GenerateItinerary],
            template.priority,
            template.confidence,
        )
        .with_freshness(DataFreshness::Static),
        Arc::new(TemplateItineraryProvider::new(template.confidence)),
    )?;

    if config.llm.enabled {
        match config.llm.get_api_key() {
            Ok(_) => {
                let client = llm::create_client(&config.llm).context("Failed to create LLM client")?;
                let slot = &config.providers.llm;
                registry.register_generative(
                    ProviderDescriptor::new(LLM_PROVIDER_ID, vec![Capability::GenerateItinerary], slot.priority, slot.confidence)
                        .with_freshness(DataFreshness::Recent),
                    Arc::new(LlmItineraryProvider::new(client, slot.confidence, config.llm.max_tokens)),
                )?;
            }
            Err(e) => info!("LLM itinerary provider disabled: {}", e),
        }
    }

    let inventory = &config.providers.inventory;
    if let Some(path) = &inventory.fixture_path {
        let provider = FixtureInventoryProvider::from_path(path, inventory.page_size, inventory.confidence)?;
        registry.register_inventory(
            ProviderDescriptor::new(
                FIXTURE_PROVIDER_ID,
                vec![Capability::SearchFlights, Capability::SearchHotels],
                inventory.priority,
                inventory.confidence,
            )
            .with_freshness(DataFreshness::RealTime),
            Arc::new(provider),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_defaults_register_template_only_without_key() {
        let mut config = Config::default();
        config.llm.api_key_env = "TRIPPLANNER_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        let registry = ProviderRegistry::new(Duration::from_millis(100));
        register_builtin_providers(&registry, &config).unwrap();
        let ids: Vec<String> = registry.all().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![TEMPLATE_PROVIDER_ID.to_string()]);
    }

    #[test]
    fn test_fixture_registered_for_both_searches() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"flights": [], "hotels": []}}"#).unwrap();
        let mut config = Config::default();
        config.llm.enabled = false;
        config.providers.inventory.fixture_path = Some(file.path().to_path_buf());

        let registry = ProviderRegistry::new(Duration::from_millis(100));
        register_builtin_providers(&registry, &config).unwrap();
        assert_eq!(registry.list(Capability::SearchHotels)[0].id, FIXTURE_PROVIDER_ID);
        assert_eq!(registry.list(Capability::SearchFlights)[0].freshness, DataFreshness::RealTime);
    }

    #[test]
    fn test_missing_fixture_is_an_error() {
        let mut config = Config::default();
        config.llm.enabled = false;
        config.providers.inventory.fixture_path = Some("/no/such/offers.json".into());
        let registry = ProviderRegistry::new(Duration::from_millis(100));
        assert!(register_builtin_providers(&registry, &config).is_err());
    }
}
