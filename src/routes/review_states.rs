use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::response::{created, ok, AppError};
use crate::scheduler::{Outcome, ScheduleMode, Track};
use crate::services::review_states::DEFAULT_DUE_LIMIT;
use crate::state::AppState;

const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    limit: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutcomeRequest {
    outcome: String,
}

#[derive(Debug, Deserialize)]
struct MilestoneRequest {
    track: String,
    index: i64,
}

#[derive(Debug, Deserialize)]
struct ModeRequest {
    mode: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedResponse {
    word_id: String,
    deleted: bool,
}

pub async fn list_due(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Response {
    let result = async {
        let user_id = require_user(&headers)?;
        let limit = parse_count(query.limit.as_deref(), "limit")?;
        let service = state.review_states();
        let items = service.list_due(&user_id, service.now(), limit).await?;
        Ok::<_, AppError>(items)
    }
    .await;

    match result {
        Ok(items) => ok(items),
        Err(err) => err.into_response(),
    }
}

pub async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Response {
    let result = async {
        let user_id = require_user(&headers)?;
        let size = parse_count(query.size.as_deref(), "size")?;
        let service = state.review_states();
        let items = service.build_session(&user_id, service.now(), size).await?;
        Ok::<_, AppError>(items)
    }
    .await;

    match result {
        Ok(items) => ok(items),
        Err(err) => err.into_response(),
    }
}

pub async fn stats(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user_id = match require_user(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    let service = state.review_states();
    match service.stats(&user_id, service.now()).await {
        Ok(stats) => ok(stats),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn get_state(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(word_id): Path<String>,
) -> Response {
    let user_id = match require_user(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    match state.review_states().view(&user_id, &word_id).await {
        Ok(view) => ok(view),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn enroll(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(word_id): Path<String>,
) -> Response {
    let user_id = match require_user(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    let service = state.review_states();
    match service.enroll(&user_id, &word_id).await {
        Ok(created_state) => created(crate::services::ReviewStateView::project(
            created_state,
            service.now(),
        )),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(word_id): Path<String>,
) -> Response {
    let user_id = match require_user(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    match state.review_states().remove(&user_id, &word_id).await {
        Ok(()) => ok(DeletedResponse {
            word_id,
            deleted: true,
        }),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn record_outcome(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(word_id): Path<String>,
    body: Bytes,
) -> Response {
    let result = async {
        let user_id = require_user(&headers)?;
        let payload: OutcomeRequest = parse_body(&body)?;
        let outcome = payload
            .outcome
            .parse::<Outcome>()
            .map_err(|e| AppError::validation(e.to_string()))?;
        let result = state
            .review_states()
            .advance_on_outcome(&user_id, &word_id, outcome)
            .await?;
        Ok::<_, AppError>(result)
    }
    .await;

    match result {
        Ok(data) => ok(data),
        Err(err) => err.into_response(),
    }
}

pub async fn toggle_milestone(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(word_id): Path<String>,
    body: Bytes,
) -> Response {
    let result = async {
        let user_id = require_user(&headers)?;
        let payload: MilestoneRequest = parse_body(&body)?;
        let track = payload
            .track
            .parse::<Track>()
            .map_err(|e| AppError::validation(e.to_string()))?;
        let index = usize::try_from(payload.index)
            .map_err(|_| AppError::validation("index must be non-negative"))?;
        let result = state
            .review_states()
            .toggle_milestone(&user_id, &word_id, track, index)
            .await?;
        Ok::<_, AppError>(result)
    }
    .await;

    match result {
        Ok(data) => ok(data),
        Err(err) => err.into_response(),
    }
}

pub async fn switch_mode(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(word_id): Path<String>,
    body: Bytes,
) -> Response {
    let result = async {
        let user_id = require_user(&headers)?;
        let payload: ModeRequest = parse_body(&body)?;
        let mode = payload
            .mode
            .parse::<ScheduleMode>()
            .map_err(|e| AppError::validation(e.to_string()))?;
        let view = state.review_states().switch_mode(&user_id, &word_id, mode).await?;
        Ok::<_, AppError>(view)
    }
    .await;

    match result {
        Ok(data) => ok(data),
        Err(err) => err.into_response(),
    }
}

pub async fn reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(word_id): Path<String>,
) -> Response {
    let user_id = match require_user(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    match state.review_states().reset(&user_id, &word_id).await {
        Ok(view) => ok(view),
        Err(err) => AppError::from(err).into_response(),
    }
}

fn require_user(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::unauthorized("未提供用户身份"))
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|_| AppError::validation("请求参数不合法"))
}

fn parse_count(raw: Option<&str>, field: &str) -> Result<usize, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(DEFAULT_DUE_LIMIT),
        Some(value) => value
            .parse::<usize>()
            .map_err(|_| AppError::validation(format!("{field} must be a non-negative integer"))),
    }
}
