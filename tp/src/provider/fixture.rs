//! Fixture inventory provider
//!
//! Serves flight and hotel offers from a JSON file. Fixture prices are per
//! traveler (flights) and per room-night for one guest (hotels); offers are
//! scaled to the party size when served.
//!
//! File layout:
//!
//! ```json
//! {
//!   "flights": [{"id": "f1", "origin": "NYC", "destination": "Rome", "price": 640.0, ...}],
//!   "hotels": [{"id": "h1", "city": "Rome", "price_per_night": 180.0, "rating": 4.5, ...}]
//! }
//! ```

use std::path::Path;

use async_trait::async_trait;
use eyre::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::domain::{FlightOffer, FlightQuery, HotelOffer, HotelQuery, OfferPage};

use super::{InventoryProvider, ProviderError};

#[derive(Debug, Clone, Deserialize)]
struct FixtureFlight {
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    destination: Option<String>,
    #[serde(flatten)]
    offer: FlightOffer,
}

#[derive(Debug, Clone, Deserialize)]
struct FixtureHotel {
    #[serde(default)]
    city: Option<String>,
    #[serde(flatten)]
    offer: HotelOffer,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FixtureData {
    #[serde(default)]
    flights: Vec<FixtureFlight>,
    #[serde(default)]
    hotels: Vec<FixtureHotel>,
}

fn matches(filter: &Option<String>, value: &str) -> bool {
    filter.as_deref().is_none_or(|f| {
        let (f, value) = (f.to_lowercase(), value.to_lowercase());
        value.contains(&f) || f.contains(&value)
    })
}

/// Offline inventory provider
#[derive(Debug, Clone)]
pub struct FixtureInventoryProvider {
    data: FixtureData,
    page_size: usize,
    confidence: f64,
}

impl FixtureInventoryProvider {
    /// Load offers from a JSON fixture file
    pub fn from_path(path: impl AsRef<Path>, page_size: usize, confidence: f64) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "FixtureInventoryProvider::from_path: called");
        let content = std::fs::read_to_string(path).context(format!("Failed to read fixture {}", path.display()))?;
        Self::from_json(&content, page_size, confidence).context(format!("Failed to parse fixture {}", path.display()))
    }

    pub fn from_json(json: &str, page_size: usize, confidence: f64) -> Result<Self> {
        let data: FixtureData = serde_json::from_str(json).context("Invalid fixture JSON")?;
        debug!(
            flights = data.flights.len(),
            hotels = data.hotels.len(),
            "FixtureInventoryProvider::from_json: loaded"
        );
        Ok(Self {
            data,
            page_size: page_size.max(1),
            confidence,
        })
    }

    fn page<T>(&self, matching: Vec<T>) -> OfferPage<T> {
        let total_found = matching.len();
        let offers = matching.into_iter().take(self.page_size).collect();
        OfferPage { offers, total_found }
    }
}

#[async_trait]
impl InventoryProvider for FixtureInventoryProvider {
    async fn search_flights(&self, query: &FlightQuery) -> Result<OfferPage<FlightOffer>, ProviderError> {
        debug!(origin = %query.origin, destination = %query.destination, "FixtureInventoryProvider::search_flights: called");
        let travelers = query.travelers.max(1) as f64;
        let matching = self
            .data
            .flights
            .iter()
            .filter(|f| matches(&f.origin, &query.origin) && matches(&f.destination, &query.destination))
            .map(|f| FlightOffer {
                price: (f.offer.price * travelers * 100.0).round() / 100.0,
                ..f.offer.clone()
            })
            .collect();
        Ok(self.page(matching))
    }

    async fn search_hotels(&self, query: &HotelQuery) -> Result<OfferPage<HotelOffer>, ProviderError> {
        debug!(destination = %query.destination, "FixtureInventoryProvider::search_hotels: called");
        // One room sleeps two
        let rooms = query.travelers.max(1).div_ceil(2) as f64;
        let matching = self
            .data
            .hotels
            .iter()
            .filter(|h| matches(&h.city, &query.destination))
            .map(|h| HotelOffer {
                price_per_night: (h.offer.price_per_night * rooms * 100.0).round() / 100.0,
                ..h.offer.clone()
            })
            .collect();
        Ok(self.page(matching))
    }

    async fn is_available(&self) -> bool {
        !self.data.flights.is_empty() || !self.data.hotels.is_empty()
    }

    fn confidence_estimate(&self) -> f64 {
        self.confidence
    }
}
