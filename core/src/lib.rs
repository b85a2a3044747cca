//! Resilient client core for the itinerary planning service.
//!
//! # Overview
//! Issues requests to the planning backend with bounded automatic retries,
//! runs every physical attempt through an outbound and an inbound
//! interception stage, and decodes responses into a strongly-typed
//! itinerary model. Every failure surfaces as a classified [`ApiError`].
//!
//! # Design
//! - Requests and responses are plain data ([`HttpRequest`], [`HttpResponse`]);
//!   the network round-trip sits behind the [`Transport`] trait.
//! - [`ClientConfig`] is resolved once and passed explicitly. There is no
//!   global client instance.
//! - Decoding ([`Envelope::from_value`]) is pure and separate from transport,
//!   so "server unreachable" and "server returned malformed data" stay
//!   distinct error kinds.
//! - Wire types are defined independently of the mock server crate;
//!   integration tests catch schema drift.

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod http;
pub mod intercept;
pub mod retry;
pub mod transport;
pub mod types;

pub use client::ItineraryClient;
pub use config::ClientConfig;
pub use error::{ApiError, ConfigError, DecodeError, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse, TransportFailure};
pub use intercept::{Notifier, OutboundInterceptor, SessionToken};
pub use retry::RetryConfig;
pub use transport::{ReqwestTransport, Sleeper, TokioSleeper, Transport};
pub use types::{
    Budget, Coordinate, DayPlan, Envelope, Itinerary, Lodging, Meal, MealKind, PhotoEnvelope,
    PointOfInterest, TripRequest, WeatherEntry,
};
