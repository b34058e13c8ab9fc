//! Self-description of the events API, served at `/api/v1/schema/`.

use std::collections::BTreeMap;

use afisha::types::{EventRecord, StoredEvent};
use axum::Json;
use schemars::{Schema, schema_for};
use serde::Serialize;

use crate::routes::EventPatch;

#[derive(Debug, Serialize)]
pub struct Endpoint {
    pub method: &'static str,
    pub path: &'static str,
    /// Requires `Authorization: Bearer <admin token>`.
    pub admin: bool,
    pub request: Option<&'static str>,
    pub response: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ApiDocument {
    pub title: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<Endpoint>,
    /// JSON Schemas of the bodies named by `endpoints`.
    pub definitions: BTreeMap<&'static str, Schema>,
}

const fn endpoint(
    method: &'static str,
    path: &'static str,
    admin: bool,
    request: Option<&'static str>,
    response: Option<&'static str>,
) -> Endpoint {
    Endpoint {
        method,
        path,
        admin,
        request,
        response,
    }
}

pub fn api_document() -> ApiDocument {
    let events = "/api/v1/events/";
    let event = "/api/v1/events/{id}/";

    ApiDocument {
        title: "afisha events API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            endpoint("GET", events, false, None, Some("StoredEvent[]")),
            endpoint("POST", events, true, Some("EventRecord"), Some("StoredEvent")),
            endpoint("GET", event, false, None, Some("StoredEvent")),
            endpoint("PUT", event, true, Some("EventRecord"), Some("StoredEvent")),
            endpoint("PATCH", event, true, Some("EventPatch"), Some("StoredEvent")),
            endpoint("DELETE", event, true, None, None),
        ],
        definitions: BTreeMap::from([
            ("EventRecord", schema_for!(EventRecord)),
            ("StoredEvent", schema_for!(StoredEvent)),
            ("EventPatch", schema_for!(EventPatch)),
        ]),
    }
}

pub async fn schema() -> Json<ApiDocument> {
    Json(api_document())
}
