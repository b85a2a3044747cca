use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{
    net::TcpListener,
    sync::{Mutex, RwLock},
};
use uuid::Uuid;

/// Id of the plan every fresh state starts with.
pub const SEEDED_PLAN_ID: u64 = 42;

/// Flat transportation estimate per travel day.
pub const TRANSPORT_PER_DAY: u64 = 50;

#[derive(Deserialize)]
pub struct TripRequest {
    pub city: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub travel_days: u32,
    pub transportation: String,
    pub accommodation: String,
    #[serde(default)]
    pub preferences: Vec<String>,
    pub free_text_input: Option<String>,
}

#[derive(Deserialize)]
pub struct PhotoQuery {
    #[serde(default)]
    pub name: String,
}

/// One request as seen by the server.
#[derive(Clone, Debug, Serialize)]
pub struct Hit {
    pub method: String,
    pub path: String,
    pub request_id: Option<Uuid>,
}

#[derive(Clone, Debug)]
struct Fault {
    status: StatusCode,
    detail: Option<String>,
}

#[derive(Default)]
struct Inner {
    plans: RwLock<HashMap<u64, Value>>,
    next_id: AtomicU64,
    faults: Mutex<VecDeque<Fault>>,
    hits: Mutex<Vec<Hit>>,
}

/// Shared server state: stored plans, scripted faults and the request log.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let mut plans = HashMap::new();
        let seeded = NaiveDate::from_ymd_opt(2025, 6, 1)
            .and_then(|start| build_plan("Beijing", start, 3, "public transit", "budget hotel"));
        if let Some(plan) = seeded {
            plans.insert(SEEDED_PLAN_ID, plan);
        }
        Self {
            inner: Arc::new(Inner {
                plans: RwLock::new(plans),
                next_id: AtomicU64::new(SEEDED_PLAN_ID + 1),
                faults: Mutex::new(VecDeque::new()),
                hits: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Answer the next request with `status` instead of handling it.
    /// Queued faults are consumed one per request, in order.
    pub async fn fail_next(&self, status: StatusCode, detail: Option<&str>) {
        self.inner.faults.lock().await.push_back(Fault {
            status,
            detail: detail.map(str::to_string),
        });
    }

    pub async fn hits(&self) -> Vec<Hit> {
        self.inner.hits.lock().await.clone()
    }

    pub async fn plan(&self, id: u64) -> Option<Value> {
        self.inner.plans.read().await.get(&id).cloned()
    }
}

pub fn app() -> Router {
    app_with_state(AppState::new())
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/api/plan", post(create_plan))
        .route("/api/plan/{id}", get(get_plan))
        .route("/api/poi/photo", get(poi_photo))
        .layer(middleware::from_fn_with_state(state.clone(), record_and_inject))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

/// Record the request, then either replay a scripted fault or pass it on.
async fn record_and_inject(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    state.inner.hits.lock().await.push(Hit {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        request_id,
    });

    let fault = state.inner.faults.lock().await.pop_front();
    if let Some(fault) = fault {
        tracing::info!(status = %fault.status, "injecting fault");
        return match fault.detail {
            Some(detail) => (fault.status, Json(json!({ "detail": detail }))).into_response(),
            None => fault.status.into_response(),
        };
    }
    next.run(request).await
}

async fn get_plan(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    match state.plan(id).await {
        Some(plan) => Json(envelope("ok", plan)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": format!("plan {id} not found") })),
        )
            .into_response(),
    }
}

async fn create_plan(State(state): State<AppState>, Json(input): Json<TripRequest>) -> Response {
    if !(1..=30).contains(&input.travel_days) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": "travel_days must be between 1 and 30" })),
        )
            .into_response();
    }
    tracing::info!(
        city = %input.city,
        days = input.travel_days,
        preferences = ?input.preferences,
        notes = input.free_text_input.as_deref().unwrap_or(""),
        "planning trip"
    );

    let Some(plan) = build_plan(
        &input.city,
        input.start_date,
        input.travel_days,
        &input.transportation,
        &input.accommodation,
    ) else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": "trip dates are outside the supported calendar" })),
        )
            .into_response();
    };
    let id = state.inner.next_id.fetch_add(1, Ordering::SeqCst);
    state.inner.plans.write().await.insert(id, plan.clone());

    (
        StatusCode::CREATED,
        [(header::LOCATION, format!("/api/plan/{id}"))],
        Json(envelope("plan created", plan)),
    )
        .into_response()
}

async fn poi_photo(Query(query): Query<PhotoQuery>) -> Json<Value> {
    let name = query.name.trim();
    if name.is_empty() {
        return Json(json!({ "success": false, "error": "name is required" }));
    }
    let slug: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    Json(json!({
        "success": true,
        "data": { "photo_url": format!("https://images.example/{slug}.jpg") }
    }))
}

fn envelope(message: &str, plan: Value) -> Value {
    json!({ "success": true, "message": message, "data": plan })
}

/// Generate a plan for `days` days starting at `start`, or `None` when the
/// trip would run past the last representable date.
///
/// The budget sums ticket prices, hotel and meal costs, plus a flat
/// transportation estimate per day.
pub fn build_plan(
    city: &str,
    start: NaiveDate,
    days: u32,
    transportation: &str,
    accommodation: &str,
) -> Option<Value> {
    let mut day_plans = Vec::new();
    let mut weather = Vec::new();
    let (mut attractions_cost, mut hotels_cost, mut meals_cost) = (0u64, 0u64, 0u64);

    for index in 0..days {
        let date = start.checked_add_days(Days::new(u64::from(index)))?;
        let ticket = 40 * u64::from(index + 1);
        let hotel = 300;
        let meals = [("breakfast", 20u64), ("lunch", 60), ("dinner", 80)];

        attractions_cost += ticket;
        hotels_cost += hotel;
        meals_cost += meals.iter().map(|(_, cost)| cost).sum::<u64>();

        weather.push(json!({
            "date": date.to_string(),
            "day_weather": "Sunny",
            "night_weather": "Clear",
            "day_temp": 26,
            "night_temp": 17,
            "wind_direction": "N",
            "wind_power": "1-3"
        }));

        day_plans.push(json!({
            "day_index": index,
            "date": date.to_string(),
            "weather": "Sunny 17-26°C",
            "description": format!("Day {} in {city}", index + 1),
            "transportation": transportation,
            "accommodation": accommodation,
            "hotel": {
                "name": format!("{city} Central Hotel"),
                "address": "1 Main Street",
                "location": { "latitude": 39.91, "longitude": 116.40 },
                "price_range": "250-350",
                "rating": "4.3",
                "distance": "800m",
                "type": accommodation,
                "estimated_cost": hotel
            },
            "attractions": [{
                "name": format!("{city} Landmark {}", index + 1),
                "address": format!("{} Heritage Road", index + 1),
                "location": { "latitude": 39.92, "longitude": 116.39 },
                "visit_duration": 120,
                "description": "Guided visit",
                "category": "culture",
                "ticket_price": ticket
            }],
            "meals": meals.iter().map(|(kind, cost)| json!({
                "type": kind,
                "name": format!("{city} {kind}"),
                "estimated_cost": cost
            })).collect::<Vec<_>>()
        }));
    }

    let transport_cost = TRANSPORT_PER_DAY * u64::from(days);
    let end = start.checked_add_days(Days::new(u64::from(days.saturating_sub(1))))?;

    Some(json!({
        "city": city,
        "start_date": start.to_string(),
        "end_date": end.to_string(),
        "travel_days": days,
        "overall_suggestions": "Book tickets online to skip queues.",
        "weather_info": weather,
        "days": day_plans,
        "budget": {
            "total_attractions": attractions_cost,
            "total_hotels": hotels_cost,
            "total_meals": meals_cost,
            "total_transportation": transport_cost,
            "total": attractions_cost + hotels_cost + meals_cost + transport_cost
        }
    }))
}
