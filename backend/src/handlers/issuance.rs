//! HTTP handlers for issuance (octroi) endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::IssuanceRecord;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::services::issuance::{CreateIssuanceInput, EditIssuanceInput, IssuanceService};
use crate::services::StepInput;
use crate::AppState;

fn service(state: &AppState) -> IssuanceService {
    IssuanceService::new(state.store.clone(), state.config.numbering.clone())
}

fn observations(body: Option<Json<StepInput>>) -> Option<String> {
    body.and_then(|Json(step)| step.observations)
}

pub async fn list_issuances(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> AppResult<Json<Vec<IssuanceRecord>>> {
    let records = service(&state).list(&actor).await?;
    Ok(Json(records))
}

pub async fn create_issuance(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<CreateIssuanceInput>,
) -> AppResult<(StatusCode, Json<IssuanceRecord>)> {
    let record = service(&state).create(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_issuance(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IssuanceRecord>> {
    let record = service(&state).get(&actor, id).await?;
    Ok(Json(record))
}

pub async fn edit_issuance(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(input): Json<EditIssuanceInput>,
) -> AppResult<Json<IssuanceRecord>> {
    let record = service(&state).edit(&actor, id, input).await?;
    Ok(Json(record))
}

pub async fn delete_issuance(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(&state).delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn hold_issuance(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Option<Json<StepInput>>,
) -> AppResult<Json<IssuanceRecord>> {
    let record = service(&state)
        .put_on_hold(&actor, id, observations(body))
        .await?;
    Ok(Json(record))
}

pub async fn approve_issuance(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Option<Json<StepInput>>,
) -> AppResult<Json<IssuanceRecord>> {
    let record = service(&state)
        .approve(&actor, id, observations(body))
        .await?;
    Ok(Json(record))
}

pub async fn reject_issuance(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Option<Json<StepInput>>,
) -> AppResult<Json<IssuanceRecord>> {
    let record = service(&state)
        .reject(&actor, id, observations(body))
        .await?;
    Ok(Json(record))
}

/// Audit trail of one record, newest first
pub async fn issuance_history(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let entries = service(&state).history(&actor, id).await?;
    Ok(Json(serde_json::json!({ "issuance_id": id, "entries": entries })))
}
