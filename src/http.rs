//! axum surface: inventory reads and rate-limited public form posts.
//!
//! ```text
//! GET  /classifieds/count   {"count": n}
//! GET  /classifieds         {"total", "page", "pageSize", "listings"}
//! POST /contact             bucket "contact"
//! POST /newsletter          bucket "newsletter"
//! POST /forms/{form}        bucket "general", counted per form name
//! ```
//!
//! `{form}` must be one of [`Buckets::general_forms`]; other names get 404 before anything is
//! counted.
//!
//! [`admin_router`] serves the two read routes without the public status restriction and must
//! only be mounted behind authentication.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::{json, Map, Value};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::filter::{Audience, RawParams};
use crate::forms::{FormKind, FormSink, TracingFormSink};
use crate::inventory::InventoryQueryService;
use crate::rate_limit::middleware::last_path_segment;
use crate::rate_limit::{Buckets, RateLimitLayer, RateLimiter};

const NO_STORE: [(header::HeaderName, &str); 1] = [(header::CACHE_CONTROL, "no-store")];

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<InventoryQueryService>,
    pub limiter: Arc<dyn RateLimiter>,
    pub buckets: Arc<Buckets>,
    pub forms: Arc<dyn FormSink>,
}

impl AppState {
    /// State with the default buckets and a logging form sink.
    pub fn new(inventory: InventoryQueryService, limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            inventory: Arc::new(inventory),
            limiter,
            buckets: Arc::new(Buckets::default()),
            forms: Arc::new(TracingFormSink),
        }
    }

    pub fn with_buckets(mut self, buckets: Buckets) -> Self {
        self.buckets = Arc::new(buckets);
        self
    }

    pub fn with_form_sink(mut self, sink: Arc<dyn FormSink>) -> Self {
        self.forms = sink;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("inventory", &self.inventory)
            .field("buckets", &self.buckets)
            .finish_non_exhaustive()
    }
}

/// Public router: LIVE listings only, plus the form endpoints.
pub fn router(state: AppState) -> Router {
    let limit = |bucket| RateLimitLayer::new(state.limiter.clone(), bucket);

    let forms = Router::new()
        .route(
            "/contact",
            post(submit_contact).route_layer(limit(state.buckets.contact().clone())),
        )
        .route(
            "/newsletter",
            post(submit_newsletter).route_layer(limit(state.buckets.newsletter().clone())),
        )
        .route(
            "/forms/{form}",
            post(submit_form)
                .route_layer(
                    limit(state.buckets.general().clone()).with_discriminator(last_path_segment),
                )
                .route_layer(middleware::from_fn_with_state(state.buckets.clone(), known_form)),
        );

    inventory_routes(Audience::Public)
        .merge(forms)
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Administrative router: same reads, any status.
pub fn admin_router(state: AppState) -> Router {
    inventory_routes(Audience::Administrator)
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

fn inventory_routes(audience: Audience) -> Router<AppState> {
    Router::new()
        .route("/classifieds/count", get(count_listings))
        .route("/classifieds", get(search_listings))
        .layer(Extension(audience))
}

/// Rejects `/forms/{form}` names outside the configured set, ahead of the limiter.
async fn known_form(
    State(buckets): State<Arc<Buckets>>,
    Path(form): Path<String>,
    req: Request,
    next: Next,
) -> Response {
    if !buckets.is_general_form(&form) {
        debug!(target: "forecourt::http", form = %form, "unknown form");
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "unknown_form" }))).into_response();
    }
    next.run(req).await
}

async fn count_listings(
    State(state): State<AppState>,
    Extension(audience): Extension<Audience>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let raw = RawParams::from(params);
    match state.inventory.count(&raw, audience).await {
        Ok(count) => (StatusCode::OK, NO_STORE, Json(json!({ "count": count }))).into_response(),
        Err(err) => {
            error!(target: "forecourt::http", error = %err, "count failed");
            (StatusCode::INTERNAL_SERVER_ERROR, NO_STORE, Json(json!({ "count": 0 })))
                .into_response()
        }
    }
}

async fn search_listings(
    State(state): State<AppState>,
    Extension(audience): Extension<Audience>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let raw = RawParams::from(params);
    match state.inventory.search(&raw, audience).await {
        Ok(results) => (StatusCode::OK, NO_STORE, Json(results)).into_response(),
        Err(err) => {
            error!(target: "forecourt::http", error = %err, "search failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                NO_STORE,
                Json(json!({ "error": "store_unavailable" })),
            )
                .into_response()
        }
    }
}

async fn submit_contact(
    State(state): State<AppState>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Response {
    accept(state.forms.as_ref(), FormKind::Contact, body).await
}

async fn submit_newsletter(
    State(state): State<AppState>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Response {
    accept(state.forms.as_ref(), FormKind::Newsletter, body).await
}

async fn submit_form(
    State(state): State<AppState>,
    Path(form): Path<String>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Response {
    accept(state.forms.as_ref(), FormKind::General(form), body).await
}

async fn accept(
    sink: &dyn FormSink,
    kind: FormKind,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Response {
    let fields = match body {
        Ok(Json(fields)) => fields,
        Err(rejection) => {
            debug!(target: "forecourt::http", form = %kind, reason = %rejection, "rejected form body");
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_body" })))
                .into_response();
        }
    };
    match sink.submit(kind.clone(), fields).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "accepted": true }))).into_response(),
        Err(err) => {
            error!(target: "forecourt::http", form = %kind, error = %err, "form sink failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "submission_failed" })))
                .into_response()
        }
    }
}
