//! Itinerary wire model.
//!
//! # Design
//! These types mirror the planning backend's JSON schema field for field.
//! They are immutable value objects: built once when a response is decoded
//! and replaced wholesale on the next fetch. Parent types own their child
//! collections and nothing points back up. Optional fields decode to `None`
//! when absent, never to a placeholder.
//!
//! Structural checks (presence, types, the meal variant set) happen in serde.
//! Value constraints such as coordinate ranges and the budget sum are checked
//! by `Itinerary::validate` in [`crate::decode`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Longest trip the planner accepts, in days.
pub const MAX_TRAVEL_DAYS: u32 = 30;

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// An attraction scheduled on a day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointOfInterest {
    pub name: String,
    pub address: String,
    pub location: Coordinate,
    /// Suggested visit length in minutes.
    pub visit_duration: u32,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_price: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MealKind {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Meal {
    #[serde(rename = "type")]
    pub kind: MealKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
}

/// Hotel suggestion for a day. The display fields are passed through as the
/// backend formats them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lodging {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinate>,
    pub price_range: String,
    pub rating: String,
    pub distance: String,
    #[serde(rename = "type")]
    pub lodging_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherEntry {
    pub date: NaiveDate,
    pub day_weather: String,
    pub night_weather: String,
    /// Degrees Celsius.
    #[serde(deserialize_with = "temperature::deserialize")]
    pub day_temp: i32,
    #[serde(deserialize_with = "temperature::deserialize")]
    pub night_temp: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_power: Option<String>,
}

/// Cost breakdown. `total` must equal the sum of the four subtotals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub total_attractions: f64,
    pub total_hotels: f64,
    pub total_meals: f64,
    pub total_transportation: f64,
    pub total: f64,
}

impl Budget {
    /// Default tolerance for [`Budget::is_consistent`].
    pub const TOLERANCE: f64 = 0.01;

    pub fn subtotal(&self) -> f64 {
        self.total_attractions + self.total_hotels + self.total_meals + self.total_transportation
    }

    pub fn is_consistent(&self, tolerance: f64) -> bool {
        (self.subtotal() - self.total).abs() <= tolerance
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayPlan {
    /// Zero-based position of this day in the trip.
    pub day_index: u32,
    pub date: NaiveDate,
    /// One-line weather summary for display.
    pub weather: String,
    pub description: String,
    pub transportation: String,
    pub accommodation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotel: Option<Lodging>,
    /// In visit order.
    pub attractions: Vec<PointOfInterest>,
    pub meals: Vec<Meal>,
}

/// A complete multi-day trip plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Itinerary {
    pub city: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub travel_days: u32,
    pub overall_suggestions: String,
    /// Chronological, one entry per covered date.
    pub weather_info: Vec<WeatherEntry>,
    /// Ordered by `day_index`, contiguous from 0.
    pub days: Vec<DayPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Budget>,
}

/// Number of calendar days covered by `start..=end`, in either order.
pub fn covered_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().abs() + 1
}

/// Top-level response wrapper for plan endpoints.
///
/// Decoded by `Envelope::from_value` in [`crate::decode`], which enforces
/// that `data` is present exactly when `success` is true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Itinerary>,
}

impl Envelope {
    pub fn into_data(self) -> Option<Itinerary> {
        self.data
    }
}

/// Body of `POST /plan`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripRequest {
    pub city: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub travel_days: u32,
    pub transportation: String,
    pub accommodation: String,
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_text_input: Option<String>,
}

impl TripRequest {
    /// Check the request before it is sent.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.city.trim().is_empty() {
            return Err(ApiError::rejected("city must not be empty"));
        }
        if !(1..=MAX_TRAVEL_DAYS).contains(&self.travel_days) {
            return Err(ApiError::rejected(format!(
                "travel_days must be between 1 and {MAX_TRAVEL_DAYS}, got {}",
                self.travel_days
            )));
        }
        if self.end_date < self.start_date {
            return Err(ApiError::rejected("end_date is before start_date"));
        }
        let expected = covered_days(self.start_date, self.end_date);
        if i64::from(self.travel_days) != expected {
            return Err(ApiError::rejected(format!(
                "travel_days is {} but the dates cover {expected} days",
                self.travel_days
            )));
        }
        Ok(())
    }
}

/// Payload of a successful `GET /poi/photo` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoData {
    pub photo_url: String,
}

/// Response wrapper of the photo lookup endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PhotoData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Accepts `16`, `"16"`, `"16°C"`, `"16℃"` or `"-3°"`.
mod temperature {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i32),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i32, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(value),
            Raw::Text(text) => parse(&text)
                .ok_or_else(|| D::Error::custom(format!("invalid temperature: {text:?}"))),
        }
    }

    pub(super) fn parse(text: &str) -> Option<i32> {
        text.trim()
            .trim_end_matches("°C")
            .trim_end_matches('℃')
            .trim_end_matches('°')
            .trim()
            .parse()
            .ok()
    }
}
