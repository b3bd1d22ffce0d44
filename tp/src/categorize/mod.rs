//! Offer categorization
//!
//! Pure functions that bucket flight and hotel offers. Identical input always
//! yields identical buckets in identical order; every sort ends on the
//! provider-issued id.

mod flights;
mod hotels;

use serde::{Deserialize, Serialize};

use crate::config::CategorizeConfig;

pub use flights::{FlightBucket, FlightBuckets, categorize_flights};
pub use hotels::{HotelBucket, HotelBuckets, categorize_hotels, recommended_bucket};

/// How bucket contents relate to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketMode {
    /// No offer appears in more than one bucket
    Disjoint,
    /// Buckets were filled independently and may share offers
    Overlapping,
    /// Fewer than three offers; every bucket holds all of them
    Sparse,
}

impl std::fmt::Display for BucketMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disjoint => write!(f, "disjoint"),
            Self::Overlapping => write!(f, "overlapping"),
            Self::Sparse => write!(f, "sparse"),
        }
    }
}

/// Categorization knobs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategorizeOptions {
    pub top_k: usize,
    pub luxury_rating_floor: f64,
}

impl Default for CategorizeOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            luxury_rating_floor: 4.0,
        }
    }
}

impl From<&CategorizeConfig> for CategorizeOptions {
    fn from(config: &CategorizeConfig) -> Self {
        Self {
            top_k: config.top_k.max(1),
            luxury_rating_floor: config.luxury_rating_floor,
        }
    }
}

/// Offer sets below this size are categorized as sparse
pub const SPARSE_THRESHOLD: usize = 3;
