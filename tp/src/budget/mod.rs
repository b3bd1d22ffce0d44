//! Budget allocation
//!
//! Splits a trip budget across five categories using fixed target bands.
//! Without known costs each category gets its band midpoint, renormalized so
//! the five shares sum to 100%. Known flight or hotel costs are reported as
//! they are; the remaining budget is re-derived for the other categories and
//! any actual outside its band is flagged, never clamped.

mod tips;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use tips::{HotelGuidance, hotel_guidance, select_tips, tip_pool};

/// Budget categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetCategory {
    Hotels,
    Flights,
    Activities,
    Food,
    LocalTransport,
}

impl BudgetCategory {
    pub const ALL: [BudgetCategory; 5] = [
        Self::Hotels,
        Self::Flights,
        Self::Activities,
        Self::Food,
        Self::LocalTransport,
    ];

    /// Target share of the total, in percent
    pub fn band(&self) -> (f64, f64) {
        match self {
            Self::Hotels => (30.0, 35.0),
            Self::Flights => (25.0, 30.0),
            Self::Activities => (20.0, 25.0),
            Self::Food => (15.0, 20.0),
            Self::LocalTransport => (5.0, 10.0),
        }
    }

    fn midpoint(&self) -> f64 {
        let (low, high) = self.band();
        (low + high) / 2.0
    }

    /// Default share after renormalizing the midpoints
    pub fn default_weight(&self) -> f64 {
        let sum: f64 = Self::ALL.iter().map(|c| c.midpoint()).sum();
        self.midpoint() / sum
    }
}

impl std::fmt::Display for BudgetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hotels => write!(f, "hotels"),
            Self::Flights => write!(f, "flights"),
            Self::Activities => write!(f, "activities"),
            Self::Food => write!(f, "food"),
            Self::LocalTransport => write!(f, "local_transport"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BudgetError {
    #[error("Budget total must be a positive amount, got {0}")]
    InvalidTotal(f64),

    #[error("Known {category} cost must be a non-negative amount, got {amount}")]
    InvalidActual { category: BudgetCategory, amount: f64 },
}

/// Non-fatal findings attached to a breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BudgetWarning {
    /// A known cost falls outside its category band
    OverAllocation {
        category: BudgetCategory,
        percentage: f64,
        band_low: f64,
        band_high: f64,
    },
    /// Known costs alone exceed the budget
    OverBudget { known_costs: f64, total_budget: f64 },
}

impl std::fmt::Display for BudgetWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OverAllocation {
                category,
                percentage,
                band_low,
                band_high,
            } => write!(
                f,
                "{} cost is {:.1}% of the budget, outside the {:.0}-{:.0}% target",
                category, percentage, band_low, band_high
            ),
            Self::OverBudget {
                known_costs,
                total_budget,
            } => write!(
                f,
                "known costs of {:.2} exceed the {:.2} budget",
                known_costs, total_budget
            ),
        }
    }
}

/// One category's share
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAllocation {
    pub category: BudgetCategory,
    pub amount: f64,
    /// Share of `total_estimated`, in percent
    pub percentage: f64,
    /// Amount comes from real offers rather than allocation
    pub actual: bool,
}

/// Costs already known from real offers
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KnownCosts {
    pub flights: Option<f64>,
    pub hotels: Option<f64>,
}

impl KnownCosts {
    fn get(&self, category: BudgetCategory) -> Option<f64> {
        match category {
            BudgetCategory::Flights => self.flights,
            BudgetCategory::Hotels => self.hotels,
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_none() && self.hotels.is_none()
    }
}

/// Percent and amount split of a budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetBreakdown {
    pub total_budget: f64,
    pub total_estimated: f64,
    pub currency: String,
    pub categories: Vec<CategoryAllocation>,
    pub tips: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<BudgetWarning>,
}

impl BudgetBreakdown {
    pub fn get(&self, category: BudgetCategory) -> Option<&CategoryAllocation> {
        self.categories.iter().find(|c| c.category == category)
    }

    pub fn amount(&self, category: BudgetCategory) -> f64 {
        self.get(category).map(|c| c.amount).unwrap_or_default()
    }

    pub fn percentage_sum(&self) -> f64 {
        self.categories.iter().map(|c| c.percentage).sum()
    }

    pub fn has_over_allocation(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, BudgetWarning::OverAllocation { .. }))
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Allocate `total` with no known costs
pub fn allocate(total: f64, currency: &str) -> Result<BudgetBreakdown, BudgetError> {
    allocate_with_actuals(total, KnownCosts::default(), currency)
}

/// Allocate `total`, honoring any known flight or hotel costs
pub fn allocate_with_actuals(total: f64, known: KnownCosts, currency: &str) -> Result<BudgetBreakdown, BudgetError> {
    debug!(%total, ?known, %currency, "allocate_with_actuals: called");
    if !total.is_finite() || total <= 0.0 {
        return Err(BudgetError::InvalidTotal(total));
    }
    for category in [BudgetCategory::Flights, BudgetCategory::Hotels] {
        if let Some(amount) = known.get(category)
            && (!amount.is_finite() || amount < 0.0)
        {
            return Err(BudgetError::InvalidActual { category, amount });
        }
    }

    let known_sum: f64 = BudgetCategory::ALL.iter().filter_map(|c| known.get(*c)).sum();
    let mut remaining = (total - known_sum).max(0.0);
    let mut amounts: Vec<(BudgetCategory, f64, bool)> = Vec::with_capacity(5);

    // Unknown hotel/flight allocations are held inside their bands
    if !known.is_empty() {
        for category in [BudgetCategory::Hotels, BudgetCategory::Flights] {
            if known.get(category).is_none() {
                let unknown_weight: f64 = BudgetCategory::ALL
                    .iter()
                    .filter(|c| known.get(**c).is_none())
                    .map(|c| c.default_weight())
                    .sum();
                let proportional = (total - known_sum).max(0.0) * category.default_weight() / unknown_weight;
                let (low, high) = category.band();
                let amount = proportional.clamp(total * low / 100.0, total * high / 100.0).min(remaining);
                remaining -= amount;
                amounts.push((category, amount, false));
            }
        }
    }

    let open: Vec<BudgetCategory> = BudgetCategory::ALL
        .into_iter()
        .filter(|c| known.get(*c).is_none() && !amounts.iter().any(|(a, _, _)| a == c))
        .collect();
    let open_weight: f64 = open.iter().map(|c| c.default_weight()).sum();
    for category in &open {
        amounts.push((*category, remaining * category.default_weight() / open_weight, false));
    }
    for category in BudgetCategory::ALL {
        if let Some(actual) = known.get(category) {
            amounts.push((category, actual, true));
        }
    }
    amounts.sort_by_key(|(c, _, _)| BudgetCategory::ALL.iter().position(|x| x == c));

    let total_estimated: f64 = amounts.iter().map(|(_, a, _)| a).sum();
    let categories: Vec<CategoryAllocation> = amounts
        .iter()
        .map(|(category, amount, actual)| CategoryAllocation {
            category: *category,
            amount: round2(*amount),
            percentage: if total_estimated > 0.0 {
                round2(amount / total_estimated * 100.0)
            } else {
                round2(category.default_weight() * 100.0)
            },
            actual: *actual,
        })
        .collect();

    let mut warnings = Vec::new();
    for category in [BudgetCategory::Hotels, BudgetCategory::Flights] {
        if let Some(actual) = known.get(category) {
            let percentage = actual / total * 100.0;
            let (band_low, band_high) = category.band();
            if percentage < band_low || percentage > band_high {
                warn!(%category, percentage, "Known cost outside target band");
                warnings.push(BudgetWarning::OverAllocation {
                    category,
                    percentage: round2(percentage),
                    band_low,
                    band_high,
                });
            }
        }
    }
    if known_sum > total {
        warn!(known_sum, total, "Known costs exceed budget");
        warnings.push(BudgetWarning::OverBudget {
            known_costs: round2(known_sum),
            total_budget: round2(total),
        });
    }

    let mut by_amount: Vec<&CategoryAllocation> = categories.iter().collect();
    by_amount.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    let order: Vec<BudgetCategory> = by_amount.iter().map(|c| c.category).collect();
    let flagged: Vec<BudgetCategory> = warnings
        .iter()
        .filter_map(|w| match w {
            BudgetWarning::OverAllocation { category, .. } => Some(*category),
            BudgetWarning::OverBudget { .. } => None,
        })
        .collect();

    Ok(BudgetBreakdown {
        total_budget: round2(total),
        total_estimated: round2(total_estimated),
        currency: currency.to_string(),
        tips: select_tips(&order, &flagged),
        categories,
        warnings,
    })
}
