//! Planning providers
//!
//! Provider traits, the registry that orders them, the fallback executor that
//! walks a chain, and the built-in providers.

mod error;
pub mod fallback;
pub mod fixture;
pub mod generative_llm;
pub mod registry;
pub mod template;
mod traits;

pub use error::ProviderError;
pub use fallback::{FallbackError, FallbackExecutor, FallbackOutcome, ProviderFailure};
pub use fixture::FixtureInventoryProvider;
pub use generative_llm::LlmItineraryProvider;
pub use registry::{Capability, ChainLink, ProviderDescriptor, ProviderHandle, ProviderRegistry};
pub use template::TemplateItineraryProvider;
pub use traits::{GenerativeProvider, InventoryProvider};

#[cfg(test)]
pub use traits::mock;
