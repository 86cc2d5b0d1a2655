//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::error;

use crate::db;
use crate::errors::IndexerError;
use crate::events::{ContributionRecord, EventRecord, ProjectRecord};

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventsResponse {
    pub project_id: i64,
    pub count: usize,
    pub events: Vec<EventRecord>,
}

#[derive(Serialize)]
pub struct AllEventsResponse {
    pub count: usize,
    pub events: Vec<EventRecord>,
}

#[derive(Serialize)]
pub struct ProjectsResponse {
    pub count: usize,
    pub projects: Vec<ProjectRecord>,
}

#[derive(Serialize)]
pub struct ContributionsResponse {
    pub project_id: i64,
    pub count: usize,
    pub contributions: Vec<ContributionRecord>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

fn internal_error(e: IndexerError) -> Response {
    error!("API query failed: {e}");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /events`
///
/// Returns all indexed events across all campaigns.
pub async fn get_all_events(State(state): State<Arc<ApiState>>) -> Response {
    match db::get_all_events(&state.pool).await {
        Ok(events) => Json(AllEventsResponse {
            count: events.len(),
            events,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

/// `GET /projects`
///
/// Campaigns in creation order, as reconstructed from their events.
pub async fn list_projects(State(state): State<Arc<ApiState>>) -> Response {
    match db::list_projects(&state.pool).await {
        Ok(projects) => Json(ProjectsResponse {
            count: projects.len(),
            projects,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

/// `GET /projects/:id`
pub async fn get_project(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<i64>,
) -> Response {
    match db::get_project(&state.pool, project_id).await {
        Ok(Some(project)) => Json(project).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("project {project_id} not indexed"),
        ),
        Err(e) => internal_error(e),
    }
}

/// `GET /projects/:id/events`
pub async fn get_project_events(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<i64>,
) -> Response {
    match db::get_events_for_project(&state.pool, project_id).await {
        Ok(events) => Json(EventsResponse {
            project_id,
            count: events.len(),
            events,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

/// `GET /projects/:id/contributions`
///
/// Cumulative amount per contributor.
pub async fn get_project_contributions(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<i64>,
) -> Response {
    match db::get_contributions(&state.pool, project_id).await {
        Ok(contributions) => Json(ContributionsResponse {
            project_id,
            count: contributions.len(),
            contributions,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}
