//! `/api/v1/events/` endpoints.
//!
//! Listing, creating, updating and deleting all re-scrape the source and
//! reconcile the store before doing their own work, so simply reading the
//! list keeps it fresh. A failed scrape is logged and the request carries on
//! with whatever is stored.

use std::sync::{Arc, Mutex, MutexGuard};

use afisha::types::{EventRecord, StoredEvent};
use afisha::{Database, EventSource};
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::docs;
use crate::error::ApiError;

pub struct AppState<S> {
    source: Arc<S>,
    db: Arc<Mutex<Database>>,
    admin_token: Option<Arc<str>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            db: Arc::clone(&self.db),
            admin_token: self.admin_token.clone(),
        }
    }
}

impl<S: EventSource> AppState<S> {
    pub fn new(source: S, db: Database, admin_token: Option<String>) -> Self {
        Self {
            source: Arc::new(source),
            db: Arc::new(Mutex::new(db)),
            admin_token: admin_token.map(Arc::from),
        }
    }

    pub fn db(&self) -> Result<MutexGuard<'_, Database>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
    }

    /// Scrapes the source and reconciles the store. Never fails the request.
    async fn refresh(&self) {
        match self.source.scrape().await {
            Ok(events) => self.store_scrape(&events),
            Err(e) => log::error!("Scrape failed, keeping stored events: {e}"),
        }
    }

    fn store_scrape(&self, events: &[EventRecord]) {
        let result = self
            .db()
            .and_then(|mut db| db.sync_events(events).map_err(ApiError::from));
        if let Err(e) = result {
            log::error!("Reconciliation failed: {e}");
        }
    }
}

/// Proof that the request carried the admin bearer token.
pub struct AdminAuth;

impl<S> FromRequestParts<AppState<S>> for AdminAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_deref() else {
            return Err(ApiError::Forbidden("writes are disabled".to_string()));
        };

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(ApiError::Unauthorized)?;

        if !token_matches(token, expected) {
            return Err(ApiError::Forbidden("invalid admin token".to_string()));
        }
        Ok(AdminAuth)
    }
}

/// Compares in time independent of where the first mismatch is.
fn token_matches(given: &str, expected: &str) -> bool {
    given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

/// Body of a `PATCH`. Absent fields are kept; `"date": null` clears the date.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct EventPatch {
    #[serde(default, deserialize_with = "present")]
    #[schemars(with = "Option<NaiveDate>")]
    pub date: Option<Option<NaiveDate>>,
    pub name: Option<String>,
    pub site: Option<String>,
}

fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl EventPatch {
    fn apply(self, mut record: EventRecord) -> EventRecord {
        if let Some(date) = self.date {
            record.date = date;
        }
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(site) = self.site {
            record.site = site;
        }
        record
    }
}

fn validate(record: EventRecord) -> Result<EventRecord, ApiError> {
    let name = record.name.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidInput("name must not be empty".to_string()));
    }
    if name.chars().count() > 200 {
        return Err(ApiError::InvalidInput(
            "name must be at most 200 characters".to_string(),
        ));
    }
    let site = record.site.trim();
    if !(site.starts_with("https://") || site.starts_with("http://")) {
        return Err(ApiError::InvalidInput(format!(
            "site must be an absolute URL: {}",
            site
        )));
    }
    Ok(EventRecord {
        date: record.date,
        name: name.to_string(),
        site: site.to_string(),
    })
}

pub fn router<S>(state: AppState<S>) -> Router
where
    S: EventSource + Send + Sync + 'static,
{
    let api = Router::new()
        .route("/events/", get(list_events::<S>).post(create_event::<S>))
        .route(
            "/events/{id}/",
            get(get_event::<S>)
                .put(update_event::<S>)
                .patch(patch_event::<S>)
                .delete(delete_event::<S>),
        )
        .route("/schema/", get(docs::schema));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", api)
        .with_state(state)
}

async fn healthz() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn list_events<S: EventSource>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<StoredEvent>>, ApiError> {
    state.refresh().await;
    let events = state.db()?.list_events()?;
    Ok(Json(events))
}

async fn get_event<S: EventSource>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<StoredEvent>, ApiError> {
    Ok(Json(state.db()?.get_event(id)?))
}

async fn create_event<S: EventSource>(
    State(state): State<AppState<S>>,
    _admin: AdminAuth,
    Json(record): Json<EventRecord>,
) -> Result<(StatusCode, Json<StoredEvent>), ApiError> {
    let record = validate(record)?;
    state.refresh().await;
    let stored = state.db()?.insert_event(&record)?;
    log::info!("Created event {} '{}'", stored.id, stored.record.name);
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn update_event<S: EventSource>(
    State(state): State<AppState<S>>,
    _admin: AdminAuth,
    Path(id): Path<i64>,
    Json(record): Json<EventRecord>,
) -> Result<Json<StoredEvent>, ApiError> {
    let record = validate(record)?;
    state.refresh().await;
    let stored = state.db()?.update_event(id, &record)?;
    Ok(Json(stored))
}

async fn patch_event<S: EventSource>(
    State(state): State<AppState<S>>,
    _admin: AdminAuth,
    Path(id): Path<i64>,
    Json(patch): Json<EventPatch>,
) -> Result<Json<StoredEvent>, ApiError> {
    state.refresh().await;
    let mut db = state.db()?;
    let current = db.get_event(id)?;
    let record = validate(patch.apply(current.record))?;
    let stored = db.update_event(id, &record)?;
    Ok(Json(stored))
}

async fn delete_event<S: EventSource>(
    State(state): State<AppState<S>>,
    _admin: AdminAuth,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.refresh().await;
    state.db()?.delete_event(id)?;
    log::info!("Deleted event {}", id);
    Ok(StatusCode::NO_CONTENT)
}
