use crate::errors::AppError;
use crate::models::{ActionKind, ActivityRecord, DailyStat, RecordRequest, StatsQuery};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

pub async fn health() -> &'static str {
    "ok"
}

pub async fn record(
    State(state): State<AppState>,
    Json(payload): Json<RecordRequest>,
) -> Result<(StatusCode, Json<ActivityRecord>), AppError> {
    let record = state
        .journal
        .record_named(&payload.subject, &payload.action)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_stats(
    State(state): State<AppState>,
    Path(subject): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Vec<DailyStat>>, AppError> {
    let action = query.action.parse::<ActionKind>()?;
    let as_of = query.as_of.unwrap_or_else(|| state.journal.now());
    let stats = state.journal.daily_stats(&subject, action, as_of).await?;
    Ok(Json(stats))
}

pub async fn get_done_stats(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> Result<Json<Vec<DailyStat>>, AppError> {
    Ok(Json(state.journal.task_done_stats(&subject).await?))
}

pub async fn get_login_stats(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> Result<Json<Vec<DailyStat>>, AppError> {
    Ok(Json(state.journal.login_stats(&subject).await?))
}
