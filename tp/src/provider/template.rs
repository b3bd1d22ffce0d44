//! Template itinerary provider
//!
//! Deterministic, offline generative provider. Builds day plans from a fixed
//! activity catalogue keyed by interest. Always available, static freshness.

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{Activity, BudgetTier, DayPlan, Itinerary, PlanningRequest};

use super::{GenerativeProvider, ProviderError};

struct Template {
    name: &'static str,
    cost: f64,
}

const fn t(name: &'static str, cost: f64) -> Template {
    Template { name, cost }
}

/// Interest keywords, the day theme they produce and their activity pool
const CATALOGUE: &[(&[&str], &str, &[Template])] = &[
    (
        &["food", "cuisine", "culinary", "wine"],
        "Food & markets",
        &[
            t("Local market tasting", 25.0),
            t("Cooking class", 70.0),
            t("Street food crawl", 30.0),
            t("Wine bar evening", 45.0),
        ],
    ),
    (
        &["history", "culture", "museums", "art", "architecture"],
        "History & culture",
        &[
            t("Old town walking tour", 20.0),
            t("Museum visit", 25.0),
            t("Historic monument tour", 30.0),
            t("Art gallery", 15.0),
        ],
    ),
    (
        &["nature", "outdoors", "hiking", "beach", "adventure"],
        "Outdoors",
        &[
            t("Scenic hike", 0.0),
            t("Botanical garden", 12.0),
            t("Park picnic", 10.0),
            t("Sunset viewpoint", 0.0),
        ],
    ),
    (
        &["nightlife", "music", "bars"],
        "Nightlife",
        &[
            t("Rooftop bar", 40.0),
            t("Live music venue", 35.0),
            t("Night market", 20.0),
        ],
    ),
    (
        &["shopping", "fashion", "crafts"],
        "Shops & crafts",
        &[t("Boutique district stroll", 0.0), t("Artisan workshop", 30.0)],
    ),
];

const SIGHTSEEING: &[Template] = &[
    t("City highlights tour", 35.0),
    t("Neighborhood walk", 0.0),
    t("Landmark visit", 20.0),
    t("Local cafe break", 8.0),
];

const EVENINGS: &[Template] = &[
    t("Dinner at a neighborhood restaurant", 40.0),
    t("Evening stroll", 0.0),
    t("Dinner with a view", 65.0),
];

fn tier_multiplier(tier: BudgetTier) -> f64 {
    match tier {
        BudgetTier::Economy => 0.6,
        BudgetTier::Moderate => 1.0,
        BudgetTier::Luxury => 1.8,
    }
}

/// The city the traveler wakes up in on each day of the trip
pub fn day_cities(request: &PlanningRequest) -> Vec<String> {
    let route = request.effective_route();
    let days = request.dates.days() as usize;
    let mut cities = Vec::with_capacity(days);
    for stay in &route {
        for _ in 0..stay.nights {
            cities.push(stay.city.clone());
        }
    }
    // Departure day (and any shortfall) stays in the final city
    let last = route
        .last()
        .map(|s| s.city.clone())
        .unwrap_or_else(|| request.destination.clone());
    cities.resize(days, last);
    cities.truncate(days);
    cities
}

/// Build a deterministic itinerary for `request`
pub fn build_itinerary(request: &PlanningRequest) -> Itinerary {
    debug!(destination = %request.destination, days = request.dates.days(), "build_itinerary: called");
    let themes: Vec<(&str, &[Template])> = CATALOGUE
        .iter()
        .filter(|(keys, _, _)| keys.iter().any(|k| request.interests.contains(*k)))
        .map(|(_, theme, pool)| (*theme, *pool))
        .collect();
    let multiplier = tier_multiplier(request.budget_tier);
    let pick = |pool: &[Template], n: usize, city: &str| {
        let tpl = &pool[n % pool.len()];
        Activity::new(tpl.name, (tpl.cost * multiplier).round()).at(city)
    };

    let cities = day_cities(request);
    let total = cities.len();
    let days = cities
        .iter()
        .zip(request.dates.start.iter_days())
        .enumerate()
        .map(|(idx, (city, date))| {
            let day = idx as u32 + 1;
            let (theme, pool) = if themes.is_empty() {
                ("Sightseeing", SIGHTSEEING)
            } else {
                themes[idx % themes.len()]
            };
            let arriving = idx == 0 || cities[idx - 1] != *city;
            let theme = if idx == 0 {
                format!("Arrival in {}", city)
            } else if idx + 1 == total && total > 1 {
                format!("Farewell to {}", city)
            } else if arriving {
                format!("Arrival in {}", city)
            } else {
                theme.to_string()
            };
            let morning = if idx == 0 {
                vec![Activity::new("Check in and settle", 0.0).at(city.as_str())]
            } else {
                vec![pick(pool, idx * 2, city.as_str())]
            };
            DayPlan {
                day,
                date,
                city: city.clone(),
                theme,
                morning,
                afternoon: vec![pick(pool, idx * 2 + 1, city.as_str()), pick(SIGHTSEEING, idx, city.as_str())],
                evening: vec![pick(EVENINGS, idx, city.as_str())],
            }
        })
        .collect();

    let mut notes = Vec::new();
    if !request.notes.is_empty() {
        notes.push(format!("Requested changes: {}", request.notes.join("; ")));
    }
    Itinerary { days, notes }
}

/// Offline generative provider
#[derive(Debug, Clone)]
pub struct TemplateItineraryProvider {
    confidence: f64,
}

impl TemplateItineraryProvider {
    pub fn new(confidence: f64) -> Self {
        Self { confidence }
    }
}

impl Default for TemplateItineraryProvider {
    fn default() -> Self {
        Self::new(0.6)
    }
}

#[async_trait]
impl GenerativeProvider for TemplateItineraryProvider {
    async fn generate_itinerary(&self, request: &PlanningRequest) -> Result<Itinerary, ProviderError> {
        debug!(destination = %request.destination, "TemplateItineraryProvider::generate_itinerary: called");
        Ok(build_itinerary(request))
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn confidence_estimate(&self) -> f64 {
        self.confidence
    }
}
