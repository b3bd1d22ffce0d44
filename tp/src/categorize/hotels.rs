//! Hotel buckets: budget, mid-range, luxury terciles

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{BudgetTier, HotelOffer};

use super::{CategorizeOptions, SPARSE_THRESHOLD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotelBucket {
    Budget,
    MidRange,
    Luxury,
}

impl std::fmt::Display for HotelBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Budget => write!(f, "budget"),
            Self::MidRange => write!(f, "mid_range"),
            Self::Luxury => write!(f, "luxury"),
        }
    }
}

/// Bucket matching a traveler's budget tier
pub fn recommended_bucket(tier: BudgetTier) -> HotelBucket {
    match tier {
        BudgetTier::Economy => HotelBucket::Budget,
        BudgetTier::Moderate => HotelBucket::MidRange,
        BudgetTier::Luxury => HotelBucket::Luxury,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelBuckets {
    pub budget: Vec<HotelOffer>,
    pub mid_range: Vec<HotelOffer>,
    pub luxury: Vec<HotelOffer>,
    pub total_found: usize,
    /// Fewer than three offers; every bucket holds all of them
    pub sparse: bool,
    /// No top-tercile offer cleared the rating floor
    pub luxury_degraded: bool,
}

impl HotelBuckets {
    pub fn get(&self, bucket: HotelBucket) -> &[HotelOffer] {
        match bucket {
            HotelBucket::Budget => &self.budget,
            HotelBucket::MidRange => &self.mid_range,
            HotelBucket::Luxury => &self.luxury,
        }
    }

    /// Cheapest offer in the tier's bucket
    pub fn pick(&self, tier: BudgetTier) -> Option<&HotelOffer> {
        self.get(recommended_bucket(tier)).first()
    }
}

/// Split `n` sorted offers into three contiguous runs, larger runs first
fn tercile_sizes(n: usize) -> [usize; 3] {
    let base = n / 3;
    let rem = n % 3;
    [base + usize::from(rem > 0), base + usize::from(rem > 1), base]
}

/// Bucket hotel offers into price-per-night terciles
pub fn categorize_hotels(offers: &[HotelOffer], total_found: usize, options: &CategorizeOptions) -> HotelBuckets {
    debug!(count = offers.len(), total_found, floor = options.luxury_rating_floor, "categorize_hotels: called");
    let total_found = total_found.max(offers.len());
    let mut sorted = offers.to_vec();
    sorted.sort_by(|a, b| {
        a.price_per_night
            .total_cmp(&b.price_per_night)
            .then_with(|| b.rating.total_cmp(&a.rating))
            .then_with(|| a.id.cmp(&b.id))
    });

    if sorted.len() < SPARSE_THRESHOLD {
        let luxury_degraded = !sorted.iter().any(|h| h.rating >= options.luxury_rating_floor);
        return HotelBuckets {
            budget: sorted.clone(),
            mid_range: sorted.clone(),
            luxury: sorted,
            total_found,
            sparse: true,
            luxury_degraded,
        };
    }

    let [low, mid, _] = tercile_sizes(sorted.len());
    let top: Vec<HotelOffer> = sorted[low + mid..].to_vec();
    let rated: Vec<HotelOffer> = top
        .iter()
        .filter(|h| h.rating >= options.luxury_rating_floor)
        .cloned()
        .collect();
    let luxury_degraded = rated.is_empty();

    HotelBuckets {
        budget: sorted[..low].to_vec(),
        mid_range: sorted[low..low + mid].to_vec(),
        luxury: if luxury_degraded { top } else { rated },
        total_found,
        sparse: false,
        luxury_degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hotel(id: &str, price: f64, rating: f64) -> HotelOffer {
        HotelOffer {
            id: id.to_string(),
            name: format!("Hotel {}", id),
            price_per_night: price,
            currency: "USD".to_string(),
            rating,
            amenities: vec![],
            booking_reference: format!("BK-{}", id),
        }
    }

    fn ids(offers: &[HotelOffer]) -> Vec<&str> {
        offers.iter().map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn test_tercile_sizes() {
        assert_eq!(tercile_sizes(3), [1, 1, 1]);
        assert_eq!(tercile_sizes(4), [2, 1, 1]);
        assert_eq!(tercile_sizes(5), [2, 2, 1]);
        assert_eq!(tercile_sizes(9), [3, 3, 3]);
    }

    #[test]
    fn test_terciles_by_price() {
        let offers = vec![
            hotel("h6", 400.0, 4.8),
            hotel("h1", 60.0, 3.0),
            hotel("h3", 150.0, 3.9),
            hotel("h2", 90.0, 3.5),
            hotel("h5", 320.0, 3.2),
            hotel("h4", 200.0, 4.1),
        ];
        let buckets = categorize_hotels(&offers, 6, &CategorizeOptions::default());
        assert!(!buckets.sparse);
        assert_eq!(ids(&buckets.budget), vec!["h1", "h2"]);
        assert_eq!(ids(&buckets.mid_range), vec!["h3", "h4"]);
        // h5 is in the top tercile but below the floor
        assert_eq!(ids(&buckets.luxury), vec!["h6"]);
        assert!(!buckets.luxury_degraded);
    }

    #[test]
    fn test_luxury_degrades_when_nothing_clears_floor() {
        let offers = vec![hotel("a", 50.0, 2.0), hotel("b", 80.0, 3.0), hotel("c", 300.0, 3.5)];
        let buckets = categorize_hotels(&offers, 3, &CategorizeOptions::default());
        assert!(buckets.luxury_degraded);
        assert_eq!(ids(&buckets.luxury), vec!["c"]);
    }

    #[test]
    fn test_sparse_hotels() {
        let offers = vec![hotel("a", 50.0, 4.5), hotel("b", 80.0, 3.0)];
        let buckets = categorize_hotels(&offers, 2, &CategorizeOptions::default());
        assert!(buckets.sparse);
        assert_eq!(buckets.budget, buckets.mid_range);
        assert_eq!(buckets.mid_range, buckets.luxury);
        assert!(!buckets.luxury_degraded);
    }

    #[test]
    fn test_recommended_bucket() {
        assert_eq!(recommended_bucket(BudgetTier::Economy), HotelBucket::Budget);
        assert_eq!(recommended_bucket(BudgetTier::Moderate), HotelBucket::MidRange);
        assert_eq!(recommended_bucket(BudgetTier::Luxury), HotelBucket::Luxury);
    }

    proptest! {
        #[test]
        fn terciles_partition_and_sort(raw in proptest::collection::vec((10.0f64..1000.0, 0.0f64..5.0), 3..30)) {
            let offers: Vec<HotelOffer> = raw
                .iter()
                .enumerate()
                .map(|(i, (p, r))| hotel(&format!("h{:02}", i), *p, *r))
                .collect();
            let buckets = categorize_hotels(&offers, offers.len(), &CategorizeOptions::default());
            prop_assert!(buckets.budget.windows(2).all(|w| w[0].price_per_night <= w[1].price_per_night));
            let max_budget = buckets.budget.iter().map(|h| h.price_per_night).fold(f64::MIN, f64::max);
            let min_mid = buckets.mid_range.iter().map(|h| h.price_per_night).fold(f64::MAX, f64::min);
            prop_assert!(max_budget <= min_mid);
            prop_assert!(!buckets.luxury.is_empty());
            if !buckets.luxury_degraded {
                prop_assert!(buckets.luxury.iter().all(|h| h.rating >= 4.0));
            }
            let again = categorize_hotels(&offers, offers.len(), &CategorizeOptions::default());
            prop_assert_eq!(buckets, again);
        }
    }
}
