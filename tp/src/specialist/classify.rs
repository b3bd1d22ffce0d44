//! Refinement change classification
//!
//! Maps free-text change requests onto a change class (which decides the
//! specialists to re-run) and the structured adjustments it implies. Rules are
//! checked in order and the first class that matches wins; only that class's
//! adjustments are applied.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{BudgetTier, DateRange, MAX_TRIP_NIGHTS, PlanningRequest, TransportMode, TripAdjustments};

use super::SpecialistKind;

const CITY: &str = r"(\p{Lu}[\p{L}'.-]*(?:\s+\p{Lu}[\p{L}'.-]*)*)";
const COUNT: &str = r"(\d+|a|an|one|two|three|four|five|six|seven|eight|nine|ten)";

static CITY_NIGHTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?i:change|make|set|keep|extend|shorten|spend|stay)\s+(?i:in\s+)?{CITY}\s+(?i:to|for|at)\s+(\d+)\s+(?i:nights?)\b"
    ))
    .expect("valid regex")
});
static NIGHTS_IN_CITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?i:spend|stay)\s+(\d+)\s+(?i:nights?)\s+(?i:in)\s+{CITY}")).expect("valid regex")
});
static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("valid regex"));
static RELATIVE_LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(add|extra|another|extend\s+by|lengthen\s+by|remove|cut|drop|shorten\s+by|lose)\s+{COUNT}\s+(?:more\s+)?(days?|nights?|weeks?)\b"
    ))
    .expect("valid regex")
});
static ABSOLUTE_LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b{COUNT}[\s-]+(days?|nights?|weeks?)\b")).expect("valid regex")
});
static NUDGE_LENGTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(extend|longer|lengthen|shorten|shorter)\b").expect("valid regex"));
static REPLACE_CITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?i:replace|swap)\s+{CITY}\s+(?i:with|for)\s+{CITY}")).expect("valid regex")
});
static ADD_CITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?i:add|include|visit|see|stop\s+in|go\s+to)\s+{CITY}")).expect("valid regex")
});
static REMOVE_CITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?i:remove|drop|skip|exclude|cut|leave\s+out)\s+{CITY}")).expect("valid regex")
});
static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\$\s?(\d[\d,]*(?:\.\d+)?)\s*(k)?\b|\b(\d[\d,]*(?:\.\d+)?)\s*(k)?\s*(?:usd|dollars|bucks)\b)")
        .expect("valid regex")
});
static TIER_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(luxury|luxurious|upscale|premium|splurge|moderate|mid-range|midrange|economy|budget-friendly|backpacker)\b")
        .expect("valid regex")
});
static STEP_DOWN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(cheaper|more\s+affordable|less\s+expensive|cut\s+costs|save\s+money|lower\s+the\s+budget)\b")
        .expect("valid regex")
});
static STEP_UP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(fancier|more\s+luxurious|upgrade|raise\s+the\s+budget|treat\s+ourselves)\b").expect("valid regex")
});
static BUDGET_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(budget|cost|price|spend|expensive)\b").expect("valid regex"));
static TRANSPORT_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(train|rail|drive|driving|car|road\s+trip|bus|coach|ferry|boat|fly|flight|plane)\b")
        .expect("valid regex")
});
static ROUTE_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(route|transport|transportation|transfer|itinerary\s+order|travel\s+between)\b")
        .expect("valid regex")
});

/// Kind of change a refinement asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeClass {
    Duration,
    Destination,
    Budget,
    Route,
    Unclassified,
}

impl ChangeClass {
    /// Specialists a change of this class re-runs
    pub fn specialists(&self) -> BTreeSet<SpecialistKind> {
        use SpecialistKind::*;
        let kinds: &[SpecialistKind] = match self {
            Self::Duration => &SpecialistKind::ALL,
            Self::Destination => &[Destination, Logistics, Culture],
            Self::Budget => &[Budget, Destination],
            Self::Route => &[Logistics, Coordinator, Destination],
            Self::Unclassified => &[Coordinator],
        };
        kinds.iter().copied().collect()
    }
}

impl std::fmt::Display for ChangeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duration => write!(f, "duration"),
            Self::Destination => write!(f, "destination"),
            Self::Budget => write!(f, "budget"),
            Self::Route => write!(f, "route"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// Outcome of classifying one change request
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub class: ChangeClass,
    pub specialists: BTreeSet<SpecialistKind>,
    pub adjustments: TripAdjustments,
    pub low_confidence: bool,
}

impl Classification {
    fn new(class: ChangeClass, mut adjustments: TripAdjustments, text: &str) -> Self {
        adjustments.notes.push(text.trim().to_string());
        Self {
            class,
            specialists: class.specialists(),
            adjustments,
            low_confidence: class == ChangeClass::Unclassified,
        }
    }
}

/// Classify `text` against the request it would change
pub fn classify(text: &str, current: &PlanningRequest) -> Classification {
    debug!(%text, "classify: called");
    let classification = duration_change(text, current)
        .or_else(|| destination_change(text, current))
        .or_else(|| budget_change(text, current))
        .or_else(|| route_change(text))
        .unwrap_or_else(|| Classification::new(ChangeClass::Unclassified, TripAdjustments::default(), text));
    debug!(class = %classification.class, specialists = ?classification.specialists, "classify: complete");
    classification
}

fn count(word: &str) -> Option<u32> {
    match word.to_lowercase().as_str() {
        "a" | "an" | "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        "eight" => Some(8),
        "nine" => Some(9),
        "ten" => Some(10),
        other => other.parse().ok(),
    }
}

/// Nights represented by `n` of `unit`, where `unit` is days, nights or weeks
fn to_nights(n: u32, unit: &str, absolute: bool) -> Option<u32> {
    let unit = unit.to_lowercase();
    if unit.starts_with("week") {
        n.checked_mul(7)
    } else if unit.starts_with("day") && absolute {
        // An N-day trip spends N-1 nights away
        Some(n.saturating_sub(1))
    } else {
        Some(n)
    }
}

/// A trip length the planner can build, rejecting zero and overlong trips
fn plannable(nights: u32) -> Option<u32> {
    (1..=MAX_TRIP_NIGHTS).contains(&nights).then_some(nights)
}

fn city_on_route(city: &str, current: &PlanningRequest) -> Option<String> {
    current.cities().into_iter().find(|c| c.eq_ignore_ascii_case(city.trim()))
}

/// City-night directives, date ranges and trip length changes
fn duration_change(text: &str, current: &PlanningRequest) -> Option<Classification> {
    let nights_now = current.dates.nights();

    let directive = CITY_NIGHTS
        .captures(text)
        .and_then(|c| Some((c.get(1)?.as_str().to_string(), c.get(2)?.as_str().parse::<u32>().ok()?)))
        .or_else(|| {
            NIGHTS_IN_CITY
                .captures(text)
                .and_then(|c| Some((c.get(2)?.as_str().to_string(), c.get(1)?.as_str().parse::<u32>().ok()?)))
        })
        .filter(|(_, nights)| plannable(*nights).is_some());
    if let Some((city, nights)) = directive {
        let single_city = current.cities().len() == 1;
        let mut adjustments = TripAdjustments::default();
        return match city_on_route(&city, current) {
            Some(_) if single_city && nights != nights_now => {
                adjustments.nights = Some(nights);
                Some(Classification::new(ChangeClass::Duration, adjustments, text))
            }
            Some(_) if single_city => None,
            Some(known) => {
                adjustments.city_nights.insert(known, nights);
                Some(Classification::new(ChangeClass::Route, adjustments, text))
            }
            None => {
                adjustments.added_cities.push(city.clone());
                adjustments.city_nights.insert(city, nights);
                Some(Classification::new(ChangeClass::Destination, adjustments, text))
            }
        };
    }

    let dates: Vec<&str> = ISO_DATE.find_iter(text).map(|m| m.as_str()).take(2).collect();
    if let &[start, end] = dates.as_slice()
        && let (Ok(start), Ok(end)) = (
            NaiveDate::parse_from_str(start, "%Y-%m-%d"),
            NaiveDate::parse_from_str(end, "%Y-%m-%d"),
        )
        && let Ok(range) = DateRange::new(start, end)
        && plannable(range.nights()).is_some()
    {
        let adjustments = TripAdjustments {
            dates: Some(range),
            ..Default::default()
        };
        return Some(Classification::new(ChangeClass::Duration, adjustments, text));
    }

    let requested = if let Some(c) = RELATIVE_LENGTH.captures(text) {
        let verb = c[1].to_lowercase();
        let n = to_nights(count(&c[2])?, &c[3], false)?;
        let shrink = ["remove", "cut", "drop", "shorten", "lose"].iter().any(|v| verb.starts_with(v));
        if shrink {
            Some(nights_now.saturating_sub(n))
        } else {
            nights_now.checked_add(n)
        }
    } else if let Some(c) = ABSOLUTE_LENGTH.captures(text) {
        to_nights(count(&c[1])?, &c[2], true)
    } else if let Some(c) = NUDGE_LENGTH.captures(text) {
        let word = c[1].to_lowercase();
        if word.starts_with("short") {
            Some(nights_now.saturating_sub(1))
        } else {
            nights_now.checked_add(1)
        }
    } else {
        None
    };
    let nights = requested.and_then(plannable)?;

    if nights == nights_now {
        return None;
    }
    let adjustments = TripAdjustments {
        nights: Some(nights),
        ..Default::default()
    };
    Some(Classification::new(ChangeClass::Duration, adjustments, text))
}

/// Cities added, removed or swapped
fn destination_change(text: &str, current: &PlanningRequest) -> Option<Classification> {
    let mut adjustments = TripAdjustments::default();

    for c in REPLACE_CITY.captures_iter(text) {
        if let Some(known) = city_on_route(&c[1], current) {
            adjustments.removed_cities.push(known);
        }
        adjustments.added_cities.push(c[2].trim().to_string());
    }
    if adjustments.added_cities.is_empty() {
        for c in ADD_CITY.captures_iter(text) {
            let city = c[1].trim();
            if city_on_route(city, current).is_none() {
                adjustments.added_cities.push(city.to_string());
            }
        }
        for c in REMOVE_CITY.captures_iter(text) {
            if let Some(known) = city_on_route(&c[1], current) {
                adjustments.removed_cities.push(known);
            }
        }
    }

    if adjustments.added_cities.is_empty() && adjustments.removed_cities.is_empty() {
        return None;
    }
    Some(Classification::new(ChangeClass::Destination, adjustments, text))
}

fn parse_amount(digits: &str, thousands: bool) -> Option<f64> {
    let value: f64 = digits.replace(',', "").parse().ok()?;
    let value = if thousands { value * 1000.0 } else { value };
    (value.is_finite() && value > 0.0).then_some(value)
}

fn step(tier: BudgetTier, up: bool) -> BudgetTier {
    match (tier, up) {
        (BudgetTier::Economy, false) => BudgetTier::Economy,
        (BudgetTier::Moderate, false) => BudgetTier::Economy,
        (BudgetTier::Luxury, false) => BudgetTier::Moderate,
        (BudgetTier::Economy, true) => BudgetTier::Moderate,
        (BudgetTier::Moderate, true) => BudgetTier::Luxury,
        (BudgetTier::Luxury, true) => BudgetTier::Luxury,
    }
}

/// Budget totals and tier changes
fn budget_change(text: &str, current: &PlanningRequest) -> Option<Classification> {
    let mut adjustments = TripAdjustments::default();

    if let Some(c) = AMOUNT.captures(text) {
        let (digits, k) = match c.get(1) {
            Some(d) => (d.as_str(), c.get(2).is_some()),
            None => (c.get(3)?.as_str(), c.get(4).is_some()),
        };
        adjustments.budget_total = parse_amount(digits, k);
    }

    if let Some(c) = TIER_WORD.captures(text) {
        let tier = match c[1].to_lowercase().as_str() {
            "luxury" | "luxurious" | "upscale" | "premium" | "splurge" => BudgetTier::Luxury,
            "moderate" | "mid-range" | "midrange" => BudgetTier::Moderate,
            _ => BudgetTier::Economy,
        };
        adjustments.budget_tier = Some(tier);
    } else if STEP_DOWN.is_match(text) {
        adjustments.budget_tier = Some(step(current.budget_tier, false));
    } else if STEP_UP.is_match(text) {
        adjustments.budget_tier = Some(step(current.budget_tier, true));
    }
    if adjustments.budget_tier == Some(current.budget_tier) {
        adjustments.budget_tier = None;
    }

    let mentions_budget = BUDGET_WORD.is_match(text) || STEP_DOWN.is_match(text) || STEP_UP.is_match(text);
    if adjustments.budget_total.is_none() && adjustments.budget_tier.is_none() && !mentions_budget {
        return None;
    }
    Some(Classification::new(ChangeClass::Budget, adjustments, text))
}

/// Transport mode and routing changes
fn route_change(text: &str) -> Option<Classification> {
    let mut adjustments = TripAdjustments::default();
    if let Some(c) = TRANSPORT_WORD.captures(text) {
        let word = c[1].to_lowercase();
        adjustments.transport = Some(match word.as_str() {
            "train" | "rail" => TransportMode::Train,
            "bus" | "coach" => TransportMode::Bus,
            "ferry" | "boat" => TransportMode::Ferry,
            "fly" | "flight" | "plane" => TransportMode::Flight,
            _ => TransportMode::Car,
        });
    } else if !ROUTE_WORD.is_match(text) {
        return None;
    }
    Some(Classification::new(ChangeClass::Route, adjustments, text))
}
