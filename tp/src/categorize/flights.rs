//! Flight buckets: cheapest, fastest, best value

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::FlightOffer;

use super::{BucketMode, CategorizeOptions, SPARSE_THRESHOLD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightBucket {
    Cheapest,
    Fastest,
    BestValue,
}

impl std::fmt::Display for FlightBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cheapest => write!(f, "cheapest"),
            Self::Fastest => write!(f, "fastest"),
            Self::BestValue => write!(f, "best_value"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightBuckets {
    pub cheapest: Vec<FlightOffer>,
    pub fastest: Vec<FlightOffer>,
    pub best_value: Vec<FlightOffer>,
    pub total_found: usize,
    pub mode: BucketMode,
}

impl FlightBuckets {
    pub fn get(&self, bucket: FlightBucket) -> &[FlightOffer] {
        match bucket {
            FlightBucket::Cheapest => &self.cheapest,
            FlightBucket::Fastest => &self.fastest,
            FlightBucket::BestValue => &self.best_value,
        }
    }

    pub fn is_sparse(&self) -> bool {
        self.mode == BucketMode::Sparse
    }

    pub fn is_disjoint(&self) -> bool {
        self.mode == BucketMode::Disjoint
    }

    /// The offer to book by default: best value, else cheapest
    pub fn pick(&self) -> Option<&FlightOffer> {
        self.best_value.first().or_else(|| self.cheapest.first())
    }
}

fn by_price(a: &FlightOffer, b: &FlightOffer) -> Ordering {
    a.price
        .total_cmp(&b.price)
        .then_with(|| a.total_duration_minutes().cmp(&b.total_duration_minutes()))
        .then_with(|| a.stops.cmp(&b.stops))
        .then_with(|| a.id.cmp(&b.id))
}

fn by_duration(a: &FlightOffer, b: &FlightOffer) -> Ordering {
    a.total_duration_minutes()
        .cmp(&b.total_duration_minutes())
        .then_with(|| a.price.total_cmp(&b.price))
        .then_with(|| a.stops.cmp(&b.stops))
        .then_with(|| a.id.cmp(&b.id))
}

/// Normalized rank in [0, 1]; equal keys share the lower rank
fn normalized_ranks<K: PartialOrd + Copy>(keys: &[K]) -> Vec<f64> {
    let n = keys.len();
    if n <= 1 {
        return vec![0.0; n];
    }
    keys.iter()
        .map(|k| {
            let rank = keys.iter().filter(|other| *other < k).count();
            rank as f64 / (n - 1) as f64
        })
        .collect()
}

/// Offers ordered by combined price and duration rank
fn value_order(offers: &[FlightOffer]) -> Vec<FlightOffer> {
    let prices: Vec<f64> = offers.iter().map(|o| o.price).collect();
    let durations: Vec<u32> = offers.iter().map(|o| o.total_duration_minutes()).collect();
    let price_ranks = normalized_ranks(&prices);
    let duration_ranks = normalized_ranks(&durations);

    let mut scored: Vec<(f64, &FlightOffer)> = offers
        .iter()
        .enumerate()
        .map(|(i, o)| (price_ranks[i] + duration_ranks[i], o))
        .collect();
    scored.sort_by(|(sa, a), (sb, b)| {
        sa.total_cmp(sb)
            .then_with(|| a.stops.cmp(&b.stops))
            .then_with(|| a.price.total_cmp(&b.price))
            .then_with(|| a.id.cmp(&b.id))
    });
    scored.into_iter().map(|(_, o)| o.clone()).collect()
}

fn take_unclaimed(ordered: &[FlightOffer], claimed: &mut Vec<String>, k: usize) -> Vec<FlightOffer> {
    let picked: Vec<FlightOffer> = ordered
        .iter()
        .filter(|o| !claimed.contains(&o.id))
        .take(k)
        .cloned()
        .collect();
    claimed.extend(picked.iter().map(|o| o.id.clone()));
    picked
}

/// Bucket flight offers
///
/// With at least three offers per bucket slot the buckets are claimed in
/// order (cheapest, fastest, best value) so no offer repeats. With fewer
/// offers each bucket is an independent top-K. Below three offers every
/// bucket holds every offer.
pub fn categorize_flights(offers: &[FlightOffer], total_found: usize, options: &CategorizeOptions) -> FlightBuckets {
    debug!(count = offers.len(), total_found, top_k = options.top_k, "categorize_flights: called");
    let k = options.top_k.max(1);
    let total_found = total_found.max(offers.len());

    let mut price_order = offers.to_vec();
    price_order.sort_by(by_price);
    let mut duration_order = offers.to_vec();
    duration_order.sort_by(by_duration);
    let value = value_order(offers);

    if offers.len() < SPARSE_THRESHOLD {
        return FlightBuckets {
            cheapest: price_order,
            fastest: duration_order,
            best_value: value,
            total_found,
            mode: BucketMode::Sparse,
        };
    }

    if offers.len() >= 3 * k {
        let mut claimed = Vec::new();
        let cheapest = take_unclaimed(&price_order, &mut claimed, k);
        let fastest = take_unclaimed(&duration_order, &mut claimed, k);
        let best_value = take_unclaimed(&value, &mut claimed, k);
        return FlightBuckets {
            cheapest,
            fastest,
            best_value,
            total_found,
            mode: BucketMode::Disjoint,
        };
    }

    FlightBuckets {
        cheapest: price_order.into_iter().take(k).collect(),
        fastest: duration_order.into_iter().take(k).collect(),
        best_value: value.into_iter().take(k).collect(),
        total_found,
        mode: BucketMode::Overlapping,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn offer(id: &str, price: f64, duration: u32, layover: u32, stops: u32) -> FlightOffer {
        FlightOffer {
            id: id.to_string(),
            price,
            currency: "USD".to_string(),
            duration_minutes: duration,
            layover_minutes: layover,
            stops,
            airline: "Test Air".to_string(),
            booking_reference: format!("BK-{}", id),
        }
    }

    fn ids(offers: &[FlightOffer]) -> Vec<&str> {
        offers.iter().map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn test_two_offers_are_sparse() {
        let offers = vec![offer("a", 500.0, 600, 0, 0), offer("b", 300.0, 700, 60, 1)];
        let buckets = categorize_flights(&offers, 2, &CategorizeOptions::default());
        assert!(buckets.is_sparse());
        assert!(!buckets.is_disjoint());
        for bucket in [FlightBucket::Cheapest, FlightBucket::Fastest, FlightBucket::BestValue] {
            let mut got = ids(buckets.get(bucket));
            got.sort();
            assert_eq!(got, vec!["a", "b"]);
        }
    }

    #[test]
    fn test_empty_is_sparse_not_missing() {
        let buckets = categorize_flights(&[], 0, &CategorizeOptions::default());
        assert!(buckets.is_sparse());
        assert!(buckets.cheapest.is_empty());
        assert!(buckets.pick().is_none());
    }

    #[test]
    fn test_fastest_counts_layovers() {
        let offers = vec![
            offer("direct", 900.0, 500, 0, 0),
            offer("short-hop", 400.0, 420, 240, 1),
            offer("mid", 600.0, 520, 30, 1),
        ];
        let buckets = categorize_flights(&offers, 3, &CategorizeOptions::default());
        assert_eq!(buckets.mode, BucketMode::Overlapping);
        assert_eq!(ids(&buckets.fastest), vec!["direct", "mid", "short-hop"]);
        assert_eq!(ids(&buckets.cheapest), vec!["short-hop", "mid", "direct"]);
    }

    #[test]
    fn test_best_value_tie_breaks_on_stops_then_price() {
        // a: cheapest/slowest, b: priciest/fastest -> equal scores, b has fewer stops
        let offers = vec![
            offer("a", 100.0, 900, 0, 2),
            offer("b", 300.0, 300, 0, 0),
            offer("c", 200.0, 600, 0, 1),
        ];
        let buckets = categorize_flights(&offers, 3, &CategorizeOptions::default());
        assert_eq!(ids(&buckets.best_value), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_disjoint_when_plenty() {
        let offers: Vec<FlightOffer> = (0..9)
            .map(|i| offer(&format!("f{}", i), 200.0 + 50.0 * i as f64, 900 - 40 * i, 0, i % 3))
            .collect();
        let buckets = categorize_flights(&offers, 40, &CategorizeOptions::default());
        assert!(buckets.is_disjoint());
        assert_eq!(buckets.total_found, 40);
        let mut all: Vec<&str> = ids(&buckets.cheapest);
        all.extend(ids(&buckets.fastest));
        all.extend(ids(&buckets.best_value));
        let before = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), before);
        assert_eq!(ids(&buckets.cheapest), vec!["f0", "f1", "f2"]);
        assert_eq!(ids(&buckets.fastest), vec!["f8", "f7", "f6"]);
    }

    #[test]
    fn test_normalized_ranks_share_ties() {
        assert_eq!(normalized_ranks(&[10.0, 10.0, 20.0]), vec![0.0, 0.0, 1.0]);
        assert_eq!(normalized_ranks(&[5u32]), vec![0.0]);
    }

    fn arb_offers() -> impl Strategy<Value = Vec<FlightOffer>> {
        proptest::collection::vec((1.0f64..5000.0, 60u32..1500, 0u32..600, 0u32..3), 3..20).prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (price, duration, layover, stops))| offer(&format!("f{:02}", i), price, duration, layover, stops))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn buckets_are_sorted_by_their_metric(offers in arb_offers()) {
            let buckets = categorize_flights(&offers, offers.len(), &CategorizeOptions::default());
            prop_assert!(buckets.cheapest.windows(2).all(|w| w[0].price <= w[1].price));
            prop_assert!(buckets
                .fastest
                .windows(2)
                .all(|w| w[0].total_duration_minutes() <= w[1].total_duration_minutes()));
            prop_assert!(buckets.cheapest.len() <= 3);
        }

        #[test]
        fn categorization_is_idempotent(offers in arb_offers()) {
            let options = CategorizeOptions::default();
            let first = categorize_flights(&offers, offers.len(), &options);
            let second = categorize_flights(&offers, offers.len(), &options);
            prop_assert_eq!(first, second);
        }
    }
}
