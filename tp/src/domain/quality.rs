//! Quality metadata attached to every planning result

use serde::{Deserialize, Serialize};

/// Coarse quality label derived from confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Basic,
    Good,
    Excellent,
}

impl QualityTier {
    /// Map a confidence score onto a tier
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.85 {
            Self::Excellent
        } else if confidence >= 0.7 {
            Self::Good
        } else {
            Self::Basic
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::Basic => write!(f, "basic"),
        }
    }
}

/// How current the provider's data is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFreshness {
    RealTime,
    Recent,
    Static,
}

impl std::fmt::Display for DataFreshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RealTime => write!(f, "real_time"),
            Self::Recent => write!(f, "recent"),
            Self::Static => write!(f, "static"),
        }
    }
}

impl std::str::FromStr for DataFreshness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "real_time" | "real-time" => Ok(Self::RealTime),
            "recent" => Ok(Self::Recent),
            "static" => Ok(Self::Static),
            _ => Err(format!("Unknown freshness: {}", s)),
        }
    }
}

/// Provenance and trust of a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetadata {
    pub provider: String,
    pub tier: QualityTier,
    pub confidence: f64,
    pub freshness: DataFreshness,
    pub fallback_used: bool,
    #[serde(default)]
    pub source_notes: Vec<String>,
}

impl QualityMetadata {
    pub fn new(provider: impl Into<String>, confidence: f64, freshness: DataFreshness) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            provider: provider.into(),
            tier: QualityTier::from_confidence(confidence),
            confidence,
            freshness,
            fallback_used: false,
            source_notes: Vec::new(),
        }
    }

    /// Lower the confidence, keeping the tier consistent
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self.tier = QualityTier::from_confidence(self.confidence);
        self
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.source_notes.push(note.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(QualityTier::from_confidence(0.9), QualityTier::Excellent);
        assert_eq!(QualityTier::from_confidence(0.85), QualityTier::Excellent);
        assert_eq!(QualityTier::from_confidence(0.8), QualityTier::Good);
        assert_eq!(QualityTier::from_confidence(0.4), QualityTier::Basic);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let q = QualityMetadata::new("fixture", 1.7, DataFreshness::RealTime);
        assert_eq!(q.confidence, 1.0);
        assert!(!q.fallback_used);
        let q = q.with_confidence(0.5);
        assert_eq!(q.tier, QualityTier::Basic);
    }

    #[test]
    fn test_freshness_serde() {
        let json = serde_json::to_string(&DataFreshness::RealTime).unwrap();
        assert_eq!(json, "\"real_time\"");
        assert_eq!("real-time".parse::<DataFreshness>().unwrap(), DataFreshness::RealTime);
    }
}
