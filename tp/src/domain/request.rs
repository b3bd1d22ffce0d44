//! Planning requests, drafts and refinement adjustments
//!
//! A `TripDraft` collects fields while a session is gathering information.
//! Once every required field is present it is frozen into a `PlanningRequest`,
//! which is never mutated afterwards. Refinements derive a new effective
//! request via `PlanningRequest::adjusted`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Budget tier chosen by the traveler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    Economy,
    #[default]
    Moderate,
    Luxury,
}

impl BudgetTier {
    /// Daily spend per traveler used when no explicit total is given
    pub fn daily_allowance(&self) -> f64 {
        match self {
            Self::Economy => 100.0,
            Self::Moderate => 250.0,
            Self::Luxury => 500.0,
        }
    }
}

impl std::fmt::Display for BudgetTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Economy => write!(f, "economy"),
            Self::Moderate => write!(f, "moderate"),
            Self::Luxury => write!(f, "luxury"),
        }
    }
}

impl std::str::FromStr for BudgetTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "economy" | "budget" | "cheap" => Ok(Self::Economy),
            "moderate" | "mid" | "mid-range" | "midrange" => Ok(Self::Moderate),
            "luxury" | "premium" => Ok(Self::Luxury),
            // Quick-reply labels like "Budget-friendly ($50-100/day)"
            other if other.starts_with("budget-") || other.starts_with("economy ") => Ok(Self::Economy),
            other if other.starts_with("moderate ") => Ok(Self::Moderate),
            other if other.starts_with("luxury ") => Ok(Self::Luxury),
            _ => Err(format!("Unknown budget tier: {}", s)),
        }
    }
}

/// Kind of trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TripType {
    #[default]
    Leisure,
    Business,
    Family,
    Romantic,
    Adventure,
}

impl std::fmt::Display for TripType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Leisure => write!(f, "leisure"),
            Self::Business => write!(f, "business"),
            Self::Family => write!(f, "family"),
            Self::Romantic => write!(f, "romantic"),
            Self::Adventure => write!(f, "adventure"),
        }
    }
}

impl std::str::FromStr for TripType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "leisure" => Ok(Self::Leisure),
            "business" => Ok(Self::Business),
            "family" => Ok(Self::Family),
            "romantic" | "couple" => Ok(Self::Romantic),
            "adventure" => Ok(Self::Adventure),
            _ => Err(format!("Unknown trip type: {}", s)),
        }
    }
}

/// Ground transport preference extracted from refinements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Train,
    Car,
    Bus,
    Ferry,
    Flight,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Train => write!(f, "train"),
            Self::Car => write!(f, "car"),
            Self::Bus => write!(f, "bus"),
            Self::Ferry => write!(f, "ferry"),
            Self::Flight => write!(f, "flight"),
        }
    }
}

/// Longest trip the planner will build an itinerary for
pub const MAX_TRIP_NIGHTS: u32 = 90;

/// Inclusive travel dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a date range, rejecting an end before the start or a trip
    /// longer than `MAX_TRIP_NIGHTS`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DraftError> {
        let invalid = |reason: String| DraftError::InvalidValue {
            field: DraftField::Dates,
            reason,
        };
        if end < start {
            return Err(invalid(format!("end date {} is before start date {}", end, start)));
        }
        if (end - start).num_days() > MAX_TRIP_NIGHTS as i64 {
            return Err(invalid(format!("trips are limited to {} nights", MAX_TRIP_NIGHTS)));
        }
        Ok(Self { start, end })
    }

    /// Number of nights away
    pub fn nights(&self) -> u32 {
        (self.end - self.start).num_days().max(0) as u32
    }

    /// Number of itinerary days (both ends inclusive)
    pub fn days(&self) -> u32 {
        self.nights() + 1
    }

    /// Same start date, different length in nights
    ///
    /// `None` when the length is past `MAX_TRIP_NIGHTS`.
    pub fn with_nights(&self, nights: u32) -> Option<Self> {
        if nights > MAX_TRIP_NIGHTS {
            return None;
        }
        let end = self.start.checked_add_signed(chrono::Duration::days(nights as i64))?;
        Some(Self { start: self.start, end })
    }

    /// Date of the given 1-based itinerary day, `None` outside the range
    pub fn date_of_day(&self, day: u32) -> Option<NaiveDate> {
        if day == 0 || day > self.days() {
            return None;
        }
        self.start.checked_add_signed(chrono::Duration::days((day - 1) as i64))
    }
}

impl std::str::FromStr for DateRange {
    type Err = DraftError;

    /// Accepts `2025-06-01..2025-06-05`, `2025-06-01 to 2025-06-05` or `2025-06-01/2025-06-05`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| DraftError::InvalidValue {
            field: DraftField::Dates,
            reason,
        };
        let normalized = s.replace(" to ", "..").replace('/', "..");
        let (start, end) = normalized
            .split_once("..")
            .ok_or_else(|| invalid(format!("expected START..END, got '{}'", s)))?;
        let parse = |d: &str| {
            NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").map_err(|e| invalid(format!("bad date '{}': {}", d.trim(), e)))
        };
        DateRange::new(parse(start)?, parse(end)?)
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One city on the route and how many nights are spent there
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityStay {
    pub city: String,
    pub nights: u32,
}

impl CityStay {
    pub fn new(city: impl Into<String>, nights: u32) -> Self {
        Self {
            city: city.into(),
            nights,
        }
    }
}

/// Fields a traveler can supply while the session collects information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftField {
    Origin,
    Destination,
    Dates,
    Travelers,
    Budget,
    Tier,
    Interests,
    TripType,
}

impl DraftField {
    /// Required fields, in the order follow-up questions ask for them
    pub const REQUIRED: [DraftField; 4] = [Self::Origin, Self::Destination, Self::Dates, Self::Travelers];

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }
}

impl std::fmt::Display for DraftField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Origin => write!(f, "origin"),
            Self::Destination => write!(f, "destination"),
            Self::Dates => write!(f, "dates"),
            Self::Travelers => write!(f, "travelers"),
            Self::Budget => write!(f, "budget"),
            Self::Tier => write!(f, "tier"),
            Self::Interests => write!(f, "interests"),
            Self::TripType => write!(f, "trip_type"),
        }
    }
}

impl std::str::FromStr for DraftField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "origin" | "from" => Ok(Self::Origin),
            "destination" | "to" => Ok(Self::Destination),
            "dates" | "date" => Ok(Self::Dates),
            "travelers" | "travellers" | "people" => Ok(Self::Travelers),
            "budget" => Ok(Self::Budget),
            "tier" | "budget_tier" => Ok(Self::Tier),
            "interests" => Ok(Self::Interests),
            "trip_type" | "type" => Ok(Self::TripType),
            _ => Err(format!("Unknown field: {}", s)),
        }
    }
}

/// Errors raised while filling in a draft
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DraftError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: DraftField, reason: String },

    #[error("Missing required fields: {0:?}")]
    Incomplete(Vec<DraftField>),
}

/// A planning request that may still be missing required fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripDraft {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub dates: Option<DateRange>,
    pub travelers: Option<u32>,
    pub budget_total: Option<f64>,
    #[serde(default)]
    pub budget_tier: BudgetTier,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default)]
    pub trip_type: TripType,
    #[serde(default)]
    pub preferred_provider: Option<String>,
}

impl TripDraft {
    /// Required fields that are still missing, in follow-up order
    pub fn missing_fields(&self) -> Vec<DraftField> {
        DraftField::REQUIRED
            .into_iter()
            .filter(|field| match field {
                DraftField::Origin => self.origin.as_deref().is_none_or(|s| s.trim().is_empty()),
                DraftField::Destination => self.destination.as_deref().is_none_or(|s| s.trim().is_empty()),
                DraftField::Dates => self.dates.is_none(),
                DraftField::Travelers => self.travelers.is_none_or(|t| t == 0),
                _ => false,
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Parse and set a single field from user text
    pub fn set_field(&mut self, field: DraftField, value: &str) -> Result<(), DraftError> {
        debug!(%field, %value, "TripDraft::set_field: called");
        let invalid = |reason: String| DraftError::InvalidValue { field, reason };
        let value = value.trim();
        match field {
            DraftField::Origin | DraftField::Destination => {
                if value.is_empty() {
                    return Err(invalid("value is empty".to_string()));
                }
                if field == DraftField::Origin {
                    self.origin = Some(value.to_string());
                } else {
                    self.destination = Some(value.to_string());
                }
            }
            DraftField::Dates => {
                self.dates = Some(value.parse()?);
            }
            DraftField::Travelers => {
                let count: u32 = match value.split_whitespace().next().unwrap_or_default().parse() {
                    Ok(count) => count,
                    Err(_) => party_size(value).ok_or_else(|| invalid(format!("'{}' is not a number", value)))?,
                };
                if count == 0 {
                    return Err(invalid("at least one traveler is required".to_string()));
                }
                self.travelers = Some(count);
            }
            DraftField::Budget => {
                let amount: f64 = value
                    .trim_start_matches('$')
                    .replace(',', "")
                    .parse()
                    .map_err(|_| invalid(format!("'{}' is not an amount", value)))?;
                if !amount.is_finite() || amount <= 0.0 {
                    return Err(invalid("budget must be positive".to_string()));
                }
                self.budget_total = Some(amount);
            }
            DraftField::Tier => {
                self.budget_tier = value.parse().map_err(invalid)?;
            }
            DraftField::Interests => {
                self.interests = value
                    .split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            DraftField::TripType => {
                self.trip_type = value.parse().map_err(invalid)?;
            }
        }
        Ok(())
    }

    /// Freeze the draft into a request
    pub fn to_request(&self) -> Result<PlanningRequest, DraftError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(DraftError::Incomplete(missing));
        }

        // missing_fields() guarantees these are present
        let (Some(origin), Some(destination), Some(dates), Some(travelers)) =
            (self.origin.clone(), self.destination.clone(), self.dates, self.travelers)
        else {
            return Err(DraftError::Incomplete(DraftField::REQUIRED.to_vec()));
        };

        let budget_total = self
            .budget_total
            .unwrap_or_else(|| self.budget_tier.daily_allowance() * dates.days() as f64 * travelers as f64);

        Ok(PlanningRequest {
            origin,
            destination,
            dates,
            travelers,
            budget_total,
            budget_tier: self.budget_tier,
            interests: self.interests.clone(),
            trip_type: self.trip_type,
            route: Vec::new(),
            transport: None,
            notes: Vec::new(),
            preferred_provider: self.preferred_provider.clone(),
        })
    }
}

/// Party size implied by a descriptive answer such as "Romantic duo"
fn party_size(value: &str) -> Option<u32> {
    let value = value.to_lowercase();
    [
        (&["solo", "alone", "just me"][..], 1),
        (&["duo", "couple", "two of us", "partner"][..], 2),
        (&["family"][..], 4),
        (&["friend", "squad", "group"][..], 4),
    ]
    .into_iter()
    .find(|(words, _)| words.iter().any(|w| value.contains(w)))
    .map(|(_, n)| n)
}

/// A complete, immutable planning request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningRequest {
    pub origin: String,
    pub destination: String,
    pub dates: DateRange,
    pub travelers: u32,
    pub budget_total: f64,
    pub budget_tier: BudgetTier,
    pub interests: BTreeSet<String>,
    pub trip_type: TripType,
    /// Ordered city stays; empty means the whole trip is spent at `destination`
    #[serde(default)]
    pub route: Vec<CityStay>,
    /// Preferred ground transport between cities
    #[serde(default)]
    pub transport: Option<TransportMode>,
    /// Free-text change requests gathered from refinements
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub preferred_provider: Option<String>,
}

impl PlanningRequest {
    /// The route, with the implicit single-destination route filled in
    pub fn effective_route(&self) -> Vec<CityStay> {
        if self.route.is_empty() {
            vec![CityStay::new(self.destination.clone(), self.dates.nights())]
        } else {
            self.route.clone()
        }
    }

    /// Cities on the route, in order
    pub fn cities(&self) -> Vec<String> {
        self.effective_route().into_iter().map(|s| s.city).collect()
    }

    /// Derive a new request with refinement adjustments applied
    pub fn adjusted(&self, adjustments: &TripAdjustments) -> PlanningRequest {
        debug!(?adjustments, "PlanningRequest::adjusted: called");
        let mut next = self.clone();

        if let Some(dates) = adjustments.dates {
            next.dates = dates;
        }
        if let Some(dates) = adjustments.nights.and_then(|n| next.dates.with_nights(n)) {
            next.dates = dates;
        }
        if let Some(total) = adjustments.budget_total {
            next.budget_total = total;
        }
        if let Some(tier) = adjustments.budget_tier {
            if adjustments.budget_total.is_none() && tier != self.budget_tier {
                // Scale the implied spend with the tier's allowance
                next.budget_total = self.budget_total * tier.daily_allowance() / self.budget_tier.daily_allowance();
            }
            next.budget_tier = tier;
        }

        let route_changed = next.dates.nights() != self.dates.nights()
            || !adjustments.added_cities.is_empty()
            || !adjustments.removed_cities.is_empty()
            || !adjustments.city_nights.is_empty();
        if route_changed {
            next.route = rebalance_route(self, adjustments, next.dates.nights());
        }

        if adjustments.transport.is_some() {
            next.transport = adjustments.transport;
        }
        next.notes.extend(adjustments.notes.iter().cloned());
        next
    }
}

/// Accumulated changes requested through refinement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripAdjustments {
    /// Replacement travel dates
    pub dates: Option<DateRange>,
    /// New total trip length in nights
    pub nights: Option<u32>,
    pub budget_total: Option<f64>,
    pub budget_tier: Option<BudgetTier>,
    pub added_cities: Vec<String>,
    pub removed_cities: Vec<String>,
    /// Pinned nights for specific cities
    pub city_nights: BTreeMap<String, u32>,
    pub transport: Option<TransportMode>,
    pub notes: Vec<String>,
}

impl TripAdjustments {
    pub fn is_empty(&self) -> bool {
        self == &TripAdjustments::default()
    }

    /// Fold a newer set of adjustments on top of this one
    pub fn merge(&mut self, newer: &TripAdjustments) {
        if newer.dates.is_some() {
            self.dates = newer.dates;
            // New dates carry their own length
            self.nights = None;
        }
        if newer.nights.is_some() {
            self.nights = newer.nights;
        }
        if newer.budget_total.is_some() {
            self.budget_total = newer.budget_total;
        }
        if newer.budget_tier.is_some() {
            self.budget_tier = newer.budget_tier;
        }
        for city in &newer.added_cities {
            self.removed_cities.retain(|c| !c.eq_ignore_ascii_case(city));
            if !self.added_cities.iter().any(|c| c.eq_ignore_ascii_case(city)) {
                self.added_cities.push(city.clone());
            }
        }
        for city in &newer.removed_cities {
            self.added_cities.retain(|c| !c.eq_ignore_ascii_case(city));
            self.city_nights.retain(|c, _| !c.eq_ignore_ascii_case(city));
            if !self.removed_cities.iter().any(|c| c.eq_ignore_ascii_case(city)) {
                self.removed_cities.push(city.clone());
            }
        }
        for (city, nights) in &newer.city_nights {
            self.city_nights.insert(city.clone(), *nights);
        }
        if newer.transport.is_some() {
            self.transport = newer.transport;
        }
        self.notes.extend(newer.notes.iter().cloned());
    }
}

/// Recompute city stays so they add up to the trip length
fn rebalance_route(base: &PlanningRequest, adjustments: &TripAdjustments, total_nights: u32) -> Vec<CityStay> {
    let mut cities: Vec<String> = base
        .cities()
        .into_iter()
        .filter(|c| !adjustments.removed_cities.iter().any(|r| r.eq_ignore_ascii_case(c)))
        .collect();
    for city in &adjustments.added_cities {
        if !cities.iter().any(|c| c.eq_ignore_ascii_case(city)) {
            cities.push(city.clone());
        }
    }
    if cities.is_empty() {
        cities.push(base.destination.clone());
    }

    let pinned = |city: &str| {
        adjustments
            .city_nights
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(city))
            .map(|(_, n)| *n)
    };

    let unpinned = cities.iter().filter(|c| pinned(c).is_none()).count() as u32;
    // Leave at least one night for every unpinned city when possible
    let mut pinned_budget = total_nights.saturating_sub(unpinned);
    let mut stays: Vec<CityStay> = cities
        .iter()
        .map(|city| {
            let nights = pinned(city).map(|n| {
                let granted = n.min(pinned_budget);
                pinned_budget -= granted;
                granted
            });
            CityStay::new(city.clone(), nights.unwrap_or(0))
        })
        .collect();

    let assigned: u32 = stays.iter().map(|s| s.nights).sum();
    let mut remaining = total_nights.saturating_sub(assigned);
    if unpinned > 0 {
        let share = remaining / unpinned;
        let mut extra = remaining % unpinned;
        for stay in stays.iter_mut().filter(|s| pinned(&s.city).is_none()) {
            stay.nights = share + u32::from(extra > 0);
            extra = extra.saturating_sub(1);
        }
        remaining = 0;
    }
    if remaining > 0
        && let Some(last) = stays.last_mut()
    {
        // Every city was pinned and the pins fall short of the trip length
        last.nights += remaining;
    }
    stays
}
