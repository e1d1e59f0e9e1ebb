//! HTTP handlers for intake (alimentation) endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::IntakeRecord;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::services::intake::{CreateIntakeInput, EditIntakeInput, IntakeService};
use crate::services::StepInput;
use crate::AppState;

fn service(state: &AppState) -> IntakeService {
    IntakeService::new(state.store.clone(), state.config.numbering.clone())
}

fn observations(body: Option<Json<StepInput>>) -> Option<String> {
    body.and_then(|Json(step)| step.observations)
}

/// List intakes visible to the caller
pub async fn list_intakes(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> AppResult<Json<Vec<IntakeRecord>>> {
    let records = service(&state).list(&actor).await?;
    Ok(Json(records))
}

pub async fn create_intake(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<CreateIntakeInput>,
) -> AppResult<(StatusCode, Json<IntakeRecord>)> {
    let record = service(&state).create(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_intake(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IntakeRecord>> {
    let record = service(&state).get(&actor, id).await?;
    Ok(Json(record))
}

pub async fn edit_intake(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(input): Json<EditIntakeInput>,
) -> AppResult<Json<IntakeRecord>> {
    let record = service(&state).edit(&actor, id, input).await?;
    Ok(Json(record))
}

pub async fn delete_intake(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(&state).delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn hold_intake(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Option<Json<StepInput>>,
) -> AppResult<Json<IntakeRecord>> {
    let record = service(&state)
        .put_on_hold(&actor, id, observations(body))
        .await?;
    Ok(Json(record))
}

/// Finance keeps a pending intake on hold without changing its state
pub async fn keep_intake_on_hold(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Option<Json<StepInput>>,
) -> AppResult<Json<IntakeRecord>> {
    let record = service(&state)
        .keep_on_hold(&actor, id, observations(body))
        .await?;
    Ok(Json(record))
}

pub async fn approve_intake(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Option<Json<StepInput>>,
) -> AppResult<Json<IntakeRecord>> {
    let record = service(&state)
        .approve(&actor, id, observations(body))
        .await?;
    Ok(Json(record))
}

pub async fn reject_intake(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Option<Json<StepInput>>,
) -> AppResult<Json<IntakeRecord>> {
    let record = service(&state)
        .reject(&actor, id, observations(body))
        .await?;
    Ok(Json(record))
}

/// Audit trail of one record, newest first
pub async fn intake_history(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let entries = service(&state).history(&actor, id).await?;
    Ok(Json(serde_json::json!({ "intake_id": id, "entries": entries })))
}
