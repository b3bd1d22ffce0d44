//! Itinerary types
//!
//! An itinerary is produced once per planning pass and replaced wholesale on
//! refinement.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Validate;

/// A single thing to do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    /// Per-person cost estimate in the plan currency
    #[serde(default)]
    pub estimated_cost: f64,
}

impl Activity {
    pub fn new(name: impl Into<String>, estimated_cost: f64) -> Self {
        Self {
            name: name.into(),
            location: None,
            estimated_cost,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Time-of-day slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBlock {
    Morning,
    Afternoon,
    Evening,
}

impl TimeBlock {
    pub const ALL: [TimeBlock; 3] = [Self::Morning, Self::Afternoon, Self::Evening];

    /// Clock window shown to travelers
    pub fn window(&self) -> &'static str {
        match self {
            Self::Morning => "09:00-12:00",
            Self::Afternoon => "13:30-18:00",
            Self::Evening => "21:00-23:00",
        }
    }
}

impl std::fmt::Display for TimeBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Morning => write!(f, "morning"),
            Self::Afternoon => write!(f, "afternoon"),
            Self::Evening => write!(f, "evening"),
        }
    }
}

/// One day of the trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    /// 1-based day number
    pub day: u32,
    pub date: NaiveDate,
    pub city: String,
    pub theme: String,
    #[serde(default)]
    pub morning: Vec<Activity>,
    #[serde(default)]
    pub afternoon: Vec<Activity>,
    #[serde(default)]
    pub evening: Vec<Activity>,
}

impl DayPlan {
    pub fn block(&self, block: TimeBlock) -> &[Activity] {
        match block {
            TimeBlock::Morning => &self.morning,
            TimeBlock::Afternoon => &self.afternoon,
            TimeBlock::Evening => &self.evening,
        }
    }

    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.morning.iter().chain(&self.afternoon).chain(&self.evening)
    }

    /// Per-person activity spend for the day
    pub fn activity_cost(&self) -> f64 {
        self.activities().map(|a| a.estimated_cost).sum()
    }
}

/// Ordered day plans for a whole trip
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub days: Vec<DayPlan>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Itinerary {
    /// Per-person activity spend for the whole trip
    pub fn activity_cost(&self) -> f64 {
        self.days.iter().map(DayPlan::activity_cost).sum()
    }

    /// Distinct cities in visiting order
    pub fn cities(&self) -> Vec<String> {
        let mut cities: Vec<String> = Vec::new();
        for day in &self.days {
            if !cities.iter().any(|c| c.eq_ignore_ascii_case(&day.city)) {
                cities.push(day.city.clone());
            }
        }
        cities
    }

    pub fn contains_city(&self, city: &str) -> bool {
        self.days.iter().any(|d| d.city.eq_ignore_ascii_case(city))
    }

    /// Short human summary of how this itinerary differs from `previous`
    pub fn diff_summary(&self, previous: &Itinerary) -> String {
        let mut parts = Vec::new();
        if self.days.len() != previous.days.len() {
            parts.push(format!("{} -> {} days", previous.days.len(), self.days.len()));
        }
        let (before, after) = (previous.cities(), self.cities());
        let added: Vec<&String> = after.iter().filter(|c| !before.contains(c)).collect();
        let removed: Vec<&String> = before.iter().filter(|c| !after.contains(c)).collect();
        if !added.is_empty() {
            parts.push(format!("added {}", join(&added)));
        }
        if !removed.is_empty() {
            parts.push(format!("removed {}", join(&removed)));
        }
        let changed = self
            .days
            .iter()
            .zip(&previous.days)
            .filter(|(a, b)| a != b)
            .count();
        if changed > 0 {
            parts.push(format!("{} day(s) rewritten", changed));
        }
        if parts.is_empty() {
            "no itinerary changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

fn join(items: &[&String]) -> String {
    items.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
}

impl Validate for Itinerary {
    fn validate(&self) -> Result<(), String> {
        if self.days.is_empty() {
            return Err("itinerary has no days".to_string());
        }
        for (idx, day) in self.days.iter().enumerate() {
            let expected = idx as u32 + 1;
            if day.day != expected {
                return Err(format!("day {} is numbered {}", expected, day.day));
            }
            if day.theme.trim().is_empty() {
                return Err(format!("day {} has no theme", day.day));
            }
            if day.city.trim().is_empty() {
                return Err(format!("day {} has no city", day.day));
            }
            if idx > 0 && day.date <= self.days[idx - 1].date {
                return Err(format!("day {} date {} is not after the previous day", day.day, day.date));
            }
            for activity in day.activities() {
                if activity.name.trim().is_empty() {
                    return Err(format!("day {} has an unnamed activity", day.day));
                }
                if !activity.estimated_cost.is_finite() || activity.estimated_cost < 0.0 {
                    return Err(format!("activity '{}' has an invalid cost", activity.name));
                }
            }
        }
        Ok(())
    }
}
