//! Flight and hotel offers returned by inventory providers

use serde::{Deserialize, Serialize};

use super::{DateRange, Validate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightOffer {
    /// Provider-issued identifier
    pub id: String,
    /// Total price for all travelers
    pub price: f64,
    pub currency: String,
    /// Time in the air
    pub duration_minutes: u32,
    #[serde(default)]
    pub layover_minutes: u32,
    #[serde(default)]
    pub stops: u32,
    #[serde(default)]
    pub airline: String,
    pub booking_reference: String,
}

impl FlightOffer {
    /// Door-to-door duration including layovers
    pub fn total_duration_minutes(&self) -> u32 {
        self.duration_minutes.saturating_add(self.layover_minutes)
    }
}

/// Longest layover accepted from a provider, in minutes
const MAX_LAYOVER_MINUTES: u32 = 48 * 60;

/// An offer with a price in some currency
pub trait Priced {
    fn offer_id(&self) -> &str;
    fn currency(&self) -> &str;
}

impl Priced for FlightOffer {
    fn offer_id(&self) -> &str {
        &self.id
    }

    fn currency(&self) -> &str {
        &self.currency
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelOffer {
    pub id: String,
    pub name: String,
    /// Price per night for the whole party
    pub price_per_night: f64,
    pub currency: String,
    /// Star or review rating, 0-5
    pub rating: f64,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub booking_reference: String,
}

impl Priced for HotelOffer {
    fn offer_id(&self) -> &str {
        &self.id
    }

    fn currency(&self) -> &str {
        &self.currency
    }
}

/// A possibly partial page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferPage<T> {
    pub offers: Vec<T>,
    /// Matches known to the provider, may exceed `offers.len()`
    pub total_found: usize,
}

impl<T> OfferPage<T> {
    pub fn new(offers: Vec<T>) -> Self {
        let total_found = offers.len();
        Self { offers, total_found }
    }

    pub fn is_partial(&self) -> bool {
        self.total_found > self.offers.len()
    }
}

impl<T: Priced> OfferPage<T> {
    /// Fails on the first offer not priced in `expected`
    pub fn check_currency(&self, expected: &str) -> Result<(), String> {
        match self.offers.iter().find(|o| !o.currency().eq_ignore_ascii_case(expected)) {
            Some(offer) => Err(format!(
                "offer {} is priced in {}, expected {}",
                offer.offer_id(),
                offer.currency(),
                expected
            )),
            None => Ok(()),
        }
    }
}

/// Inputs for a flight search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightQuery {
    pub origin: String,
    pub destination: String,
    pub dates: DateRange,
    pub travelers: u32,
}

/// Inputs for a hotel search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelQuery {
    pub destination: String,
    pub dates: DateRange,
    pub travelers: u32,
}

fn check_money(id: &str, amount: f64, currency: &str) -> Result<(), String> {
    if id.trim().is_empty() {
        return Err("offer without an id".to_string());
    }
    if !amount.is_finite() || amount < 0.0 {
        return Err(format!("offer {} has invalid price {}", id, amount));
    }
    if currency.len() != 3 {
        return Err(format!("offer {} has invalid currency '{}'", id, currency));
    }
    Ok(())
}

impl Validate for FlightOffer {
    fn validate(&self) -> Result<(), String> {
        check_money(&self.id, self.price, &self.currency)?;
        if self.duration_minutes == 0 {
            return Err(format!("flight {} has zero duration", self.id));
        }
        if self.layover_minutes > MAX_LAYOVER_MINUTES {
            return Err(format!("flight {} has a {} minute layover", self.id, self.layover_minutes));
        }
        Ok(())
    }
}

impl Validate for HotelOffer {
    fn validate(&self) -> Result<(), String> {
        check_money(&self.id, self.price_per_night, &self.currency)?;
        if !(0.0..=5.0).contains(&self.rating) {
            return Err(format!("hotel {} has rating {} outside 0-5", self.id, self.rating));
        }
        Ok(())
    }
}

impl<T: Validate> Validate for OfferPage<T> {
    fn validate(&self) -> Result<(), String> {
        if self.total_found < self.offers.len() {
            return Err(format!(
                "total_found {} is smaller than the {} offers returned",
                self.total_found,
                self.offers.len()
            ));
        }
        self.offers.iter().try_for_each(Validate::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight(id: &str, price: f64) -> FlightOffer {
        FlightOffer {
            id: id.to_string(),
            price,
            currency: "USD".to_string(),
            duration_minutes: 480,
            layover_minutes: 90,
            stops: 1,
            airline: "ITA".to_string(),
            booking_reference: format!("BK-{}", id),
        }
    }

    #[test]
    fn test_total_duration_includes_layover() {
        assert_eq!(flight("f1", 500.0).total_duration_minutes(), 570);
    }

    #[test]
    fn test_page_validation() {
        let page = OfferPage {
            offers: vec![flight("f1", 500.0)],
            total_found: 40,
        };
        assert!(page.validate().is_ok());
        assert!(page.is_partial());

        let bad = OfferPage {
            offers: vec![flight("f1", 500.0), flight("f2", 400.0)],
            total_found: 1,
        };
        assert!(bad.validate().is_err());

        let negative = OfferPage::new(vec![flight("f3", -1.0)]);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_layover_is_bounded() {
        let mut offer = flight("f1", 500.0);
        offer.duration_minutes = u32::MAX;
        offer.layover_minutes = u32::MAX;
        assert_eq!(offer.total_duration_minutes(), u32::MAX);
        assert!(offer.validate().is_err());
    }

    #[test]
    fn test_check_currency() {
        let mut euro = flight("f2", 450.0);
        euro.currency = "EUR".to_string();
        let page = OfferPage::new(vec![flight("f1", 500.0), euro]);
        let err = page.check_currency("USD").unwrap_err();
        assert!(err.contains("f2") && err.contains("EUR"));
        assert!(OfferPage::new(vec![flight("f1", 500.0)]).check_currency("usd").is_ok());
    }

    #[test]
    fn test_hotel_rating_range() {
        let hotel = HotelOffer {
            id: "h1".to_string(),
            name: "Hotel Roma".to_string(),
            price_per_night: 150.0,
            currency: "EUR".to_string(),
            rating: 6.0,
            amenities: vec![],
            booking_reference: "BK-h1".to_string(),
        };
        assert!(hotel.validate().is_err());
    }
}
