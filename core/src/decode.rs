//! Schema validation and envelope decoding.
//!
//! # Design
//! Decoding is pure and synchronous. It runs after the inbound stage has
//! produced a JSON value and never touches the network. Serde handles
//! presence and type checks. The functions here add the value constraints
//! serde cannot express and the envelope's `success`/`data` pairing.
//!
//! An envelope that contradicts itself is a [`ApiError::Protocol`]; anything
//! wrong inside the itinerary is a [`ApiError::Decode`]. A budget whose total
//! disagrees with its subtotals is logged as a data-integrity warning and then
//! rejected. It is never corrected in place.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, DecodeError};
use crate::types::{
    covered_days, Budget, Coordinate, DayPlan, Envelope, Itinerary, Lodging, Meal, PhotoEnvelope,
    PointOfInterest,
};

#[derive(Deserialize)]
struct RawEnvelope {
    success: bool,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl Envelope {
    /// Decode and validate an envelope from a response body.
    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        let raw: RawEnvelope = serde_json::from_value(value).map_err(DecodeError::from)?;

        let data = match (raw.success, raw.data) {
            (true, None) => {
                return Err(ApiError::protocol("envelope reports success but carries no data"));
            }
            (false, Some(_)) => {
                return Err(ApiError::protocol("envelope reports failure but carries data"));
            }
            (true, Some(data)) => {
                let itinerary: Itinerary =
                    serde_json::from_value(data).map_err(DecodeError::from)?;
                itinerary.validate()?;
                Some(itinerary)
            }
            (false, None) => None,
        };

        Ok(Envelope {
            success: raw.success,
            message: raw.message,
            data,
        })
    }

    pub fn from_json(body: &str) -> Result<Self, ApiError> {
        let value: Value = serde_json::from_str(body).map_err(DecodeError::from)?;
        Self::from_value(value)
    }
}

impl PhotoEnvelope {
    /// Decode a photo lookup response, yielding the URL when the lookup
    /// succeeded and `None` when the backend reported the lookup as failed.
    pub fn photo_url_from_value(value: Value) -> Result<Option<String>, ApiError> {
        let envelope: PhotoEnvelope = serde_json::from_value(value).map_err(DecodeError::from)?;
        match (envelope.success, envelope.data) {
            (true, Some(data)) => Ok(Some(data.photo_url)),
            (true, None) => Err(ApiError::protocol(
                "photo lookup reports success but carries no data",
            )),
            (false, _) => {
                tracing::debug!(error = ?envelope.error, "photo lookup reported failure");
                Ok(None)
            }
        }
    }
}

impl Itinerary {
    /// Check every value constraint of the plan and its children.
    pub fn validate(&self) -> Result<(), DecodeError> {
        let expected_days = covered_days(self.start_date, self.end_date);
        if i64::from(self.travel_days) != expected_days {
            return Err(DecodeError::invalid(
                "travel_days",
                format!(
                    "{} does not match {} to {} ({expected_days} days)",
                    self.travel_days, self.start_date, self.end_date
                ),
            ));
        }

        let (first, last) = if self.start_date <= self.end_date {
            (self.start_date, self.end_date)
        } else {
            (self.end_date, self.start_date)
        };
        for (i, entry) in self.weather_info.iter().enumerate() {
            if entry.date < first || entry.date > last {
                return Err(DecodeError::invalid(
                    format!("weather_info[{i}].date"),
                    format!("{} is outside the trip ({first} to {last})", entry.date),
                ));
            }
        }

        for (i, pair) in self.weather_info.windows(2).enumerate() {
            if pair[1].date <= pair[0].date {
                return Err(DecodeError::invalid(
                    format!("weather_info[{}].date", i + 1),
                    format!("{} does not follow {}", pair[1].date, pair[0].date),
                ));
            }
        }

        for (position, day) in self.days.iter().enumerate() {
            if day.day_index as usize != position {
                return Err(DecodeError::DayIndex {
                    position,
                    found: day.day_index,
                });
            }
            day.validate(&format!("days[{position}]"))?;
        }

        if let Some(budget) = &self.budget {
            budget.validate()?;
        }
        Ok(())
    }
}

impl DayPlan {
    fn validate(&self, path: &str) -> Result<(), DecodeError> {
        for (i, poi) in self.attractions.iter().enumerate() {
            poi.validate(&format!("{path}.attractions[{i}]"))?;
        }
        for (i, meal) in self.meals.iter().enumerate() {
            meal.validate(&format!("{path}.meals[{i}]"))?;
        }
        if let Some(hotel) = &self.hotel {
            hotel.validate(&format!("{path}.hotel"))?;
        }
        Ok(())
    }
}

impl PointOfInterest {
    fn validate(&self, path: &str) -> Result<(), DecodeError> {
        self.location.validate(&format!("{path}.location"))?;
        if self.visit_duration == 0 {
            return Err(DecodeError::invalid(
                format!("{path}.visit_duration"),
                "must be greater than zero",
            ));
        }
        check_cost(self.ticket_price, &format!("{path}.ticket_price"))
    }
}

impl Meal {
    fn validate(&self, path: &str) -> Result<(), DecodeError> {
        if let Some(location) = &self.location {
            location.validate(&format!("{path}.location"))?;
        }
        check_cost(self.estimated_cost, &format!("{path}.estimated_cost"))
    }
}

impl Lodging {
    fn validate(&self, path: &str) -> Result<(), DecodeError> {
        if let Some(location) = &self.location {
            location.validate(&format!("{path}.location"))?;
        }
        check_cost(self.estimated_cost, &format!("{path}.estimated_cost"))
    }
}

impl Coordinate {
    fn validate(&self, path: &str) -> Result<(), DecodeError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(DecodeError::invalid(
                format!("{path}.latitude"),
                format!("{} is outside [-90, 90]", self.latitude),
            ));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(DecodeError::invalid(
                format!("{path}.longitude"),
                format!("{} is outside [-180, 180]", self.longitude),
            ));
        }
        Ok(())
    }
}

impl Budget {
    fn validate(&self) -> Result<(), DecodeError> {
        for (field, value) in [
            ("budget.total_attractions", self.total_attractions),
            ("budget.total_hotels", self.total_hotels),
            ("budget.total_meals", self.total_meals),
            ("budget.total_transportation", self.total_transportation),
            ("budget.total", self.total),
        ] {
            check_cost(Some(value), field)?;
        }
        if !self.is_consistent(Budget::TOLERANCE) {
            tracing::warn!(
                total = self.total,
                subtotal = self.subtotal(),
                "budget total does not match its subtotals"
            );
            return Err(DecodeError::BudgetMismatch {
                total: self.total,
                subtotal: self.subtotal(),
            });
        }
        Ok(())
    }
}

fn check_cost(value: Option<f64>, field: &str) -> Result<(), DecodeError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(DecodeError::invalid(
            field,
            format!("{v} is not a non-negative amount"),
        )),
        _ => Ok(()),
    }
}
