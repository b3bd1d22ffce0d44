//! Provider registry
//!
//! Process-wide, read-mostly table of providers. Reads take a shared lock;
//! the only writers are registration and availability probes, and a probe
//! only touches its own entry.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::DataFreshness;

use super::{GenerativeProvider, InventoryProvider, ProviderError};

/// What a provider can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    GenerateItinerary,
    SearchFlights,
    SearchHotels,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GenerateItinerary => write!(f, "generate_itinerary"),
            Self::SearchFlights => write!(f, "search_flights"),
            Self::SearchHotels => write!(f, "search_hotels"),
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").to_lowercase().as_str() {
            "generate_itinerary" | "generate" | "itinerary" => Ok(Self::GenerateItinerary),
            "search_flights" | "flights" => Ok(Self::SearchFlights),
            "search_hotels" | "hotels" => Ok(Self::SearchHotels),
            _ => Err(format!("Unknown capability: {}", s)),
        }
    }
}

/// Public description of a registered provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub capabilities: Vec<Capability>,
    /// Lower runs first
    pub priority: u32,
    pub available: bool,
    pub confidence: f64,
    pub freshness: DataFreshness,
}

impl ProviderDescriptor {
    pub fn new(id: impl Into<String>, capabilities: Vec<Capability>, priority: u32, confidence: f64) -> Self {
        Self {
            id: id.into(),
            capabilities,
            priority,
            available: true,
            confidence: confidence.clamp(0.0, 1.0),
            freshness: DataFreshness::Static,
        }
    }

    pub fn with_freshness(mut self, freshness: DataFreshness) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// The callable side of a registered provider
#[derive(Clone)]
pub enum ProviderHandle {
    Generative(Arc<dyn GenerativeProvider>),
    Inventory(Arc<dyn InventoryProvider>),
}

impl ProviderHandle {
    fn admits(&self, capability: Capability) -> bool {
        match self {
            Self::Generative(_) => capability == Capability::GenerateItinerary,
            Self::Inventory(_) => matches!(capability, Capability::SearchFlights | Capability::SearchHotels),
        }
    }

    async fn is_available(&self) -> bool {
        match self {
            Self::Generative(p) => p.is_available().await,
            Self::Inventory(p) => p.is_available().await,
        }
    }
}

/// One link in a fallback chain
pub struct ChainLink<P: ?Sized> {
    pub descriptor: ProviderDescriptor,
    pub provider: Arc<P>,
}

impl<P: ?Sized> Clone for ChainLink<P> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            provider: self.provider.clone(),
        }
    }
}

struct Entry {
    descriptor: ProviderDescriptor,
    handle: ProviderHandle,
}

/// Registry of generative and inventory providers
pub struct ProviderRegistry {
    entries: RwLock<Vec<Entry>>,
    probe_timeout: Duration,
}

impl ProviderRegistry {
    pub fn new(probe_timeout: Duration) -> Self {
        debug!(?probe_timeout, "ProviderRegistry::new: called");
        Self {
            entries: RwLock::new(Vec::new()),
            probe_timeout,
        }
    }

    /// Register a provider, replacing any entry with the same id
    pub fn register(&self, descriptor: ProviderDescriptor, handle: ProviderHandle) -> Result<(), ProviderError> {
        debug!(provider = %descriptor.id, priority = descriptor.priority, "register: called");
        if let Some(capability) = descriptor.capabilities.iter().find(|c| !handle.admits(**c)) {
            return Err(ProviderError::Unsupported(*capability));
        }
        if descriptor.capabilities.is_empty() {
            return Err(ProviderError::Call(format!("provider {} declares no capabilities", descriptor.id)));
        }

        let mut entries = self.entries.write();
        entries.retain(|e| e.descriptor.id != descriptor.id);
        info!(provider = %descriptor.id, capabilities = ?descriptor.capabilities, "Registered provider");
        entries.push(Entry { descriptor, handle });
        Ok(())
    }

    pub fn register_generative(
        &self,
        descriptor: ProviderDescriptor,
        provider: Arc<dyn GenerativeProvider>,
    ) -> Result<(), ProviderError> {
        self.register(descriptor, ProviderHandle::Generative(provider))
    }

    pub fn register_inventory(
        &self,
        descriptor: ProviderDescriptor,
        provider: Arc<dyn InventoryProvider>,
    ) -> Result<(), ProviderError> {
        self.register(descriptor, ProviderHandle::Inventory(provider))
    }

    /// Descriptors supporting `capability`, ordered by priority then id
    pub fn list(&self, capability: Capability) -> Vec<ProviderDescriptor> {
        debug!(%capability, "list: called");
        let mut out: Vec<ProviderDescriptor> = self
            .entries
            .read()
            .iter()
            .filter(|e| e.descriptor.supports(capability))
            .map(|e| e.descriptor.clone())
            .collect();
        out.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// Every registered descriptor, ordered by priority then id
    pub fn all(&self) -> Vec<ProviderDescriptor> {
        let mut out: Vec<ProviderDescriptor> = self.entries.read().iter().map(|e| e.descriptor.clone()).collect();
        out.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub fn get(&self, id: &str) -> Option<ProviderDescriptor> {
        self.entries
            .read()
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| e.descriptor.clone())
    }

    /// Refresh one provider's availability
    ///
    /// Never fails: unknown ids, probe errors and slow probes all read as
    /// unavailable.
    pub async fn probe(&self, id: &str) -> bool {
        debug!(%id, "probe: called");
        // Clone the handle so no lock is held across the await
        let handle = self
            .entries
            .read()
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| e.handle.clone());
        let Some(handle) = handle else {
            debug!(%id, "probe: unknown provider");
            return false;
        };

        let available = match tokio::time::timeout(self.probe_timeout, handle.is_available()).await {
            Ok(available) => available,
            Err(_) => {
                warn!(%id, timeout = ?self.probe_timeout, "Availability probe timed out");
                false
            }
        };

        if let Some(entry) = self.entries.write().iter_mut().find(|e| e.descriptor.id == id)
            && entry.descriptor.available != available
        {
            info!(%id, available, "Provider availability changed");
            entry.descriptor.available = available;
        }
        available
    }

    /// Probe every provider concurrently
    pub async fn probe_all(&self) -> Vec<(String, bool)> {
        debug!("probe_all: called");
        let ids: Vec<String> = self.entries.read().iter().map(|e| e.descriptor.id.clone()).collect();
        let results = futures::future::join_all(ids.iter().map(|id| self.probe(id))).await;
        ids.into_iter().zip(results).collect()
    }

    /// Generative chain in priority order, `preferred` first when it is registered
    pub fn generative_chain(&self, preferred: Option<&str>) -> Vec<ChainLink<dyn GenerativeProvider>> {
        self.chain(Capability::GenerateItinerary, preferred, |h| match h {
            ProviderHandle::Generative(p) => Some(p.clone()),
            ProviderHandle::Inventory(_) => None,
        })
    }

    /// Inventory chain for flights or hotels
    pub fn inventory_chain(
        &self,
        capability: Capability,
        preferred: Option<&str>,
    ) -> Vec<ChainLink<dyn InventoryProvider>> {
        self.chain(capability, preferred, |h| match h {
            ProviderHandle::Inventory(p) => Some(p.clone()),
            ProviderHandle::Generative(_) => None,
        })
    }

    fn chain<P: ?Sized>(
        &self,
        capability: Capability,
        preferred: Option<&str>,
        pick: impl Fn(&ProviderHandle) -> Option<Arc<P>>,
    ) -> Vec<ChainLink<P>> {
        debug!(%capability, ?preferred, "chain: called");
        let entries = self.entries.read();
        let mut links: Vec<ChainLink<P>> = entries
            .iter()
            .filter(|e| e.descriptor.supports(capability))
            .filter_map(|e| {
                pick(&e.handle).map(|provider| ChainLink {
                    descriptor: e.descriptor.clone(),
                    provider,
                })
            })
            .collect();
        links.sort_by(|a, b| {
            a.descriptor
                .priority
                .cmp(&b.descriptor.priority)
                .then_with(|| a.descriptor.id.cmp(&b.descriptor.id))
        });
        if let Some(preferred) = preferred
            && let Some(pos) = links.iter().position(|l| l.descriptor.id == preferred)
        {
            let link = links.remove(pos);
            links.insert(0, link);
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{MockBehavior, MockGenerativeProvider, MockInventoryProvider};

    fn registry() -> ProviderRegistry {
        let registry = ProviderRegistry::new(Duration::from_millis(100));
        registry
            .register_generative(
                ProviderDescriptor::new("template", vec![Capability::GenerateItinerary], 20, 0.6),
                Arc::new(MockGenerativeProvider::new(MockBehavior::Succeed)),
            )
            .unwrap();
        registry
            .register_generative(
                ProviderDescriptor::new("llm", vec![Capability::GenerateItinerary], 10, 0.85),
                Arc::new(MockGenerativeProvider::new(MockBehavior::Succeed)),
            )
            .unwrap();
        registry
            .register_inventory(
                ProviderDescriptor::new("fixture", vec![Capability::SearchFlights, Capability::SearchHotels], 10, 0.8),
                Arc::new(MockInventoryProvider::new(MockBehavior::Succeed, vec![], vec![])),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_list_orders_by_priority() {
        let registry = registry();
        let ids: Vec<String> = registry
            .list(Capability::GenerateItinerary)
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["llm", "template"]);
        assert_eq!(registry.list(Capability::SearchHotels).len(), 1);
    }

    #[test]
    fn test_register_rejects_mismatched_capability() {
        let registry = registry();
        let result = registry.register_generative(
            ProviderDescriptor::new("bad", vec![Capability::SearchFlights], 1, 0.5),
            Arc::new(MockGenerativeProvider::new(MockBehavior::Succeed)),
        );
        assert_eq!(result, Err(ProviderError::Unsupported(Capability::SearchFlights)));
    }

    #[test]
    fn test_register_replaces_same_id() {
        let registry = registry();
        registry
            .register_generative(
                ProviderDescriptor::new("template", vec![Capability::GenerateItinerary], 5, 0.6),
                Arc::new(MockGenerativeProvider::new(MockBehavior::Succeed)),
            )
            .unwrap();
        let list = registry.list(Capability::GenerateItinerary);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "template");
    }

    #[test]
    fn test_chain_moves_preferred_first() {
        let registry = registry();
        let chain = registry.generative_chain(Some("template"));
        assert_eq!(chain[0].descriptor.id, "template");
        assert_eq!(chain[1].descriptor.id, "llm");

        let chain = registry.generative_chain(Some("missing"));
        assert_eq!(chain[0].descriptor.id, "llm");
    }

    #[tokio::test]
    async fn test_probe_fails_soft() {
        let registry = ProviderRegistry::new(Duration::from_millis(100));
        let provider = Arc::new(MockGenerativeProvider::new(MockBehavior::Succeed));
        registry
            .register_generative(
                ProviderDescriptor::new("llm", vec![Capability::GenerateItinerary], 10, 0.85),
                provider.clone(),
            )
            .unwrap();

        provider.set_available(false);
        assert!(!registry.probe("llm").await);
        assert!(!registry.get("llm").unwrap().available);

        provider.set_available(true);
        assert!(registry.probe("llm").await);
        assert!(registry.get("llm").unwrap().available);

        assert!(!registry.probe("nope").await);
    }

    #[tokio::test]
    async fn test_concurrent_reads_during_probe() {
        let registry = Arc::new(registry());
        let reader = {
            let registry = registry.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    assert_eq!(registry.list(Capability::GenerateItinerary).len(), 2);
                    tokio::task::yield_now().await;
                }
            })
        };
        let results = registry.probe_all().await;
        assert_eq!(results.len(), 3);
        reader.await.unwrap();
    }
}
