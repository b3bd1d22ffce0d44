//! Cost-saving tips and hotel guidance

use serde::{Deserialize, Serialize};

use super::BudgetCategory;

/// Fixed tip pool, keyed by category
pub fn tip_pool(category: BudgetCategory) -> &'static [&'static str] {
    match category {
        BudgetCategory::Hotels => &[
            "Book accommodation 4-6 weeks ahead for better rates",
            "Consider a short-term rental with a kitchen for longer stays",
            "Stay just outside the center near a transit line",
        ],
        BudgetCategory::Flights => &[
            "Set fare alerts and fly midweek when prices dip",
            "Compare nearby airports for cheaper routes",
            "Travel carry-on only to avoid baggage fees",
        ],
        BudgetCategory::Activities => &[
            "Look for a city pass that bundles museum entry and transit",
            "Check for free walking tours and free museum days",
            "Book popular attractions online to skip door surcharges",
        ],
        BudgetCategory::Food => &[
            "Eat your main meal at lunch when set menus are cheaper",
            "Shop at local markets for picnic supplies",
            "Avoid restaurants right next to major landmarks",
        ],
        BudgetCategory::LocalTransport => &[
            "Buy a multi-day transit pass instead of single tickets",
            "Walk or rent bikes for short distances",
            "Take trains between cities instead of short flights",
        ],
    }
}

/// Pick tips for the largest categories first, plus an extra tip for each flagged category
pub fn select_tips(by_amount_desc: &[BudgetCategory], flagged: &[BudgetCategory]) -> Vec<String> {
    let mut tips: Vec<String> = by_amount_desc
        .iter()
        .take(3)
        .map(|c| tip_pool(*c)[0].to_string())
        .collect();
    for category in flagged {
        let tip = tip_pool(*category)[1].to_string();
        if !tips.contains(&tip) {
            tips.push(tip);
        }
    }
    // Top up from the pool in category order if fewer than three categories were given
    for category in BudgetCategory::ALL {
        if tips.len() >= 3 {
            break;
        }
        let tip = tip_pool(category)[0].to_string();
        if !tips.contains(&tip) {
            tips.push(tip);
        }
    }
    tips
}

/// Nightly hotel budget and what it buys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelGuidance {
    pub per_night: f64,
    pub per_person_per_night: f64,
    pub price_range: (f64, f64),
    pub accommodation_types: Vec<String>,
}

/// Turn a hotel allocation into nightly guidance
pub fn hotel_guidance(hotel_amount: f64, nights: u32, travelers: u32) -> HotelGuidance {
    let per_night = hotel_amount / nights.max(1) as f64;
    let per_person_per_night = per_night / travelers.max(1) as f64;
    let types: &[&str] = if per_night < 100.0 {
        &["Hostels", "Budget hotels", "Short-term rentals"]
    } else if per_night < 200.0 {
        &["Mid-range hotels", "Boutique hotels", "Short-term rentals"]
    } else if per_night < 400.0 {
        &["Upscale hotels", "Resorts", "Boutique hotels"]
    } else {
        &["Luxury hotels", "Resorts", "Premium accommodations"]
    };
    HotelGuidance {
        per_night: super::round2(per_night),
        per_person_per_night: super::round2(per_person_per_night),
        price_range: (super::round2(per_night * 0.8), super::round2(per_night * 1.2)),
        accommodation_types: types.iter().map(|s| s.to_string()).collect(),
    }
}
