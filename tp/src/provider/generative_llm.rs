//! LLM-backed itinerary provider
//!
//! Asks the model for a JSON itinerary and accepts it only if it parses and
//! matches the requested trip length.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::{Activity, DayPlan, Itinerary, PlanningRequest, Validate};
use crate::llm::{CompletionRequest, LlmClient};

use super::{GenerativeProvider, ProviderError};

const SYSTEM_PROMPT: &str = "You are a travel planner. Reply with a single JSON object and nothing else. \
Shape: {\"days\":[{\"day\":1,\"city\":\"...\",\"theme\":\"...\",\
\"morning\":[{\"name\":\"...\",\"location\":\"...\",\"estimated_cost\":0}],\
\"afternoon\":[...],\"evening\":[...]}],\"notes\":[\"...\"]}. \
estimated_cost is per person in the trip currency. Produce exactly one entry per trip day.";

#[derive(Debug, Deserialize)]
struct GeneratedItinerary {
    days: Vec<GeneratedDay>,
    #[serde(default)]
    notes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedDay {
    day: u32,
    city: String,
    theme: String,
    #[serde(default)]
    morning: Vec<Activity>,
    #[serde(default)]
    afternoon: Vec<Activity>,
    #[serde(default)]
    evening: Vec<Activity>,
}

/// Generative provider backed by an `LlmClient`
pub struct LlmItineraryProvider {
    client: Arc<dyn LlmClient>,
    confidence: f64,
    max_tokens: u32,
}

impl LlmItineraryProvider {
    pub fn new(client: Arc<dyn LlmClient>, confidence: f64, max_tokens: u32) -> Self {
        Self {
            client,
            confidence,
            max_tokens,
        }
    }

    fn prompt(request: &PlanningRequest) -> String {
        let route = request
            .effective_route()
            .iter()
            .map(|s| format!("{} ({} nights)", s.city, s.nights))
            .collect::<Vec<_>>()
            .join(" -> ");
        let interests = if request.interests.is_empty() {
            "general sightseeing".to_string()
        } else {
            request.interests.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        let mut prompt = format!(
            "Plan a {} trip from {} for {} traveler(s), {} to {} ({} days).\n\
             Route: {}\nBudget tier: {}, total budget {:.0}.\nInterests: {}.",
            request.trip_type,
            request.origin,
            request.travelers,
            request.dates.start,
            request.dates.end,
            request.dates.days(),
            route,
            request.budget_tier,
            request.budget_total,
            interests,
        );
        if !request.notes.is_empty() {
            prompt.push_str(&format!("\nTraveler change requests: {}", request.notes.join("; ")));
        }
        prompt
    }
}

/// Pull the JSON object out of a reply that may be wrapped in a code fence
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Convert the model's reply into a validated itinerary for `request`
pub fn parse_itinerary(text: &str, request: &PlanningRequest) -> Result<Itinerary, ProviderError> {
    let json = extract_json(text).ok_or_else(|| ProviderError::DataInvalid("reply contains no JSON object".to_string()))?;
    let generated: GeneratedItinerary =
        serde_json::from_str(json).map_err(|e| ProviderError::DataInvalid(format!("itinerary JSON: {}", e)))?;

    let expected = request.dates.days() as usize;
    if generated.days.len() != expected {
        return Err(ProviderError::DataInvalid(format!(
            "expected {} days, got {}",
            expected,
            generated.days.len()
        )));
    }

    let days = generated
        .days
        .into_iter()
        .map(|d| {
            let date = request.dates.date_of_day(d.day).ok_or_else(|| {
                ProviderError::DataInvalid(format!("day {} is outside the {}-day trip", d.day, expected))
            })?;
            Ok(DayPlan {
                day: d.day,
                date,
                city: d.city,
                theme: d.theme,
                morning: d.morning,
                afternoon: d.afternoon,
                evening: d.evening,
            })
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;
    let itinerary = Itinerary {
        days,
        notes: generated.notes,
    };
    itinerary.validate().map_err(ProviderError::DataInvalid)?;
    Ok(itinerary)
}

#[async_trait]
impl GenerativeProvider for LlmItineraryProvider {
    async fn generate_itinerary(&self, request: &PlanningRequest) -> Result<Itinerary, ProviderError> {
        debug!(destination = %request.destination, model = %self.client.model(), "LlmItineraryProvider::generate_itinerary: called");
        let completion = CompletionRequest::new(SYSTEM_PROMPT, Self::prompt(request), self.max_tokens).with_prefill("{");

        let reply = self.client.complete(&completion).await.map_err(|e| {
            warn!(error = %e, "LLM itinerary request failed");
            if e.is_unavailable() {
                ProviderError::Unavailable(e.to_string())
            } else {
                ProviderError::Call(e.to_string())
            }
        })?;

        if reply.truncated {
            return Err(ProviderError::DataInvalid(format!(
                "reply cut off at {} output tokens",
                reply.output_tokens
            )));
        }
        parse_itinerary(&reply.text, request)
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn confidence_estimate(&self) -> f64 {
        self.confidence
    }
}
