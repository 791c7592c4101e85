pub mod dto;
pub mod negotiate;

use axum::extract::Path;
use axum::middleware;
use axum::response::Response;
use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::auth::{require_admin_token, require_token};
use crate::error::AppError;
use crate::services::parse_reference_date;
use crate::state::AppState;
use dto::{CacheStatsList, ClassResponse, PlanInfoResponse, RoomResponse, TeacherResponse};
use negotiate::ReturnType;

pub fn router(state: AppState) -> Router {
    let vplan = Router::new()
        .route("/{date}/class/{name}", get(class))
        .route("/{date}/teacher/{shorthand}", get(teacher))
        .route("/{date}/room/{name}", get(room))
        .route("/{date}/info", get(info))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    let admin = Router::new()
        .route("/cache-stats", get(cache_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin_token));

    Router::new()
        .route("/health", get(health))
        .nest("/api/vplan", vplan)
        .nest("/api/admin", admin)
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn class(
    State(state): State<AppState>,
    return_type: ReturnType,
    Path((date, name)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let date = parse_reference_date(&date)?;
    let class = state
        .store
        .class_for(date, &name)
        .await
        .into_result(date, || AppError::ClassNotFound(name.clone()))?;
    return_type.respond("Class", &ClassResponse::from(class.as_ref()))
}

async fn teacher(
    State(state): State<AppState>,
    return_type: ReturnType,
    Path((date, shorthand)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let date = parse_reference_date(&date)?;
    let view = state
        .store
        .teacher_for(date, &shorthand)
        .await
        .into_result(date, || AppError::TeacherNotFound(shorthand.clone()))?;
    return_type.respond("Teacher", &TeacherResponse::from(&view))
}

async fn room(
    State(state): State<AppState>,
    return_type: ReturnType,
    Path((date, name)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let date = parse_reference_date(&date)?;
    let view = state
        .store
        .room_for(date, &name)
        .await
        .into_result(date, || AppError::RoomNotFound(name.clone()))?;
    return_type.respond("Room", &RoomResponse::from(&view))
}

async fn info(
    State(state): State<AppState>,
    return_type: ReturnType,
    Path(date): Path<String>,
) -> Result<Response, AppError> {
    let date = parse_reference_date(&date)?;
    let header = state
        .store
        .header_for(date)
        .await
        .into_result(date, || AppError::PlanNotFound(date))?;
    return_type.respond("PlanInfo", &PlanInfoResponse::from(header))
}

async fn cache_stats(State(state): State<AppState>, return_type: ReturnType) -> Result<Response, AppError> {
    let stats = state.store.stats().await;
    match return_type {
        ReturnType::Json => return_type.respond("Stats", &stats),
        // XML needs one document element around the entries
        ReturnType::Xml => return_type.respond("Stats", &CacheStatsList { entries: &stats }),
    }
}
