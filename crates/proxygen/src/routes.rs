use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_DISPOSITION;
use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::auth::authorize;
use crate::error::ApiError;
use crate::fetch::USERINFO_HEADER;
use crate::service;
use crate::state::AppState;

/// Builds the service router:
///
/// - `GET  /api/v2/profiles?name=..&name=..&api_key=..[&override=..]`
/// - `PUT  /api/v2/profiles/{profile}?url=..&api_key=..`
/// - `GET  /health`
pub fn build_router(state: AppState) -> Router {
    let profiles = Router::new()
        .route("/profiles", get(get_profiles))
        .route("/profiles/", get(get_profiles))
        .route("/profiles/{profile}", put(update_profile));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v2", profiles)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Raw query pairs; `name` may repeat, which a struct extractor cannot express.
struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    fn all(&self, key: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn first(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn require(&self, key: &str) -> Result<&str, ApiError> {
        self.first(key)
            .ok_or_else(|| ApiError::unprocessable(format!("missing query parameter '{key}'")))
    }
}

async fn get_profiles(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let params = QueryParams(params);
    let names = params.all("name");
    if names.is_empty() {
        return Err(ApiError::unprocessable("missing query parameter 'name'"));
    }
    authorize(&state, params.require("api_key")?)?;
    let override_name = params.first("override").map(str::to_owned);

    let first_name = names[0].clone();
    let generated = tokio::task::spawn_blocking(move || {
        service::generate_profiles(&state, &names, override_name.as_deref())
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "generation task failed");
        ApiError::internal("Error generating configuration")
    })??;

    let mut response = Json(generated.config).into_response();
    let headers = response.headers_mut();

    match HeaderValue::try_from(format!("inline; filename={first_name}")) {
        Ok(value) => {
            headers.insert(CONTENT_DISPOSITION, value);
        }
        Err(_) => tracing::warn!(profile = %first_name, "profile name not valid in a header"),
    }

    if let Some(userinfo) = generated.subscription.header_value() {
        tracing::debug!(userinfo = %userinfo, "subscription info");
        if let Ok(value) = HeaderValue::try_from(userinfo) {
            headers.insert(HeaderName::from_static(USERINFO_HEADER), value);
        }
    }

    Ok(response)
}

#[derive(Serialize)]
struct UpdateResponse {
    status: &'static str,
    message: String,
}

async fn update_profile(
    State(state): State<AppState>,
    Path(profile): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let params = QueryParams(params);
    let url = params.require("url")?;
    authorize(&state, params.require("api_key")?)?;

    let count = service::fetch_and_update(&state, &profile, url).await?;

    Ok(Json(UpdateResponse {
        status: "success",
        message: format!("Profile '{profile}' updated with {count} proxies."),
    }))
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}
