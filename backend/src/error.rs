//! Error handling for the stock approval server
//!
//! Every error is answered with the same JSON envelope carrying an English and
//! a French message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::workflow::TransitionDenied;
use thiserror::Error;

use crate::store::StoreError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Business errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_fr: String,
    },

    #[error("Invalid transition: {message} (current state: {current_state})")]
    InvalidTransition {
        current_state: String,
        message: String,
    },

    #[error("Insufficient stock: {available} available, {requested} requested")]
    InsufficientStock {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Record locked: {0}")]
    RecordLocked(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    // Transport errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &str, message: &str, message_fr: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_fr: message_fr.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::RecordLocked(_) => "RECORD_LOCKED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<TransitionDenied> for AppError {
    fn from(denied: TransitionDenied) -> Self {
        AppError::InvalidTransition {
            current_state: denied.current_state,
            message: denied.reason,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientStock { available } => AppError::InsufficientStock {
                available,
                requested: Decimal::ZERO,
            },
            StoreError::NotFound { entity, id } => {
                AppError::NotFound(format!("{} {}", entity, id))
            }
            other => {
                tracing::error!(error = %other, "store failure");
                AppError::Persistence(other.to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("body".to_string(), "Invalid request".to_string()));

        AppError::Validation {
            message_fr: format!("Champ invalide : {}", field),
            field,
            message,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_fr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message_en, message_fr, field) = match &self {
            AppError::Validation {
                field,
                message,
                message_fr,
            } => (
                StatusCode::BAD_REQUEST,
                message.clone(),
                message_fr.clone(),
                Some(field.clone()),
            ),
            AppError::InvalidTransition {
                current_state,
                message,
            } => (
                StatusCode::CONFLICT,
                format!("{} (current state: {})", message, current_state),
                format!("Transition impossible (statut actuel : {})", current_state),
                None,
            ),
            AppError::InsufficientStock {
                available,
                requested,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "Insufficient stock: {} available, {} requested",
                    available, requested
                ),
                format!("Stock insuffisant. Disponible : {}", available),
                None,
            ),
            AppError::RecordLocked(msg) => (
                StatusCode::CONFLICT,
                msg.clone(),
                "Cet enregistrement est verrouillé".to_string(),
                None,
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                format!("{} not found", resource),
                format!("{} introuvable", resource),
                None,
            ),
            AppError::Persistence(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "A persistence error occurred".to_string(),
                "Erreur lors de l'enregistrement".to_string(),
                None,
            ),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                msg.clone(),
                "Non authentifié".to_string(),
                None,
            ),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                msg.clone(),
                "Accès refusé".to_string(),
                None,
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Configuration error: {}", msg),
                "Erreur de configuration".to_string(),
                None,
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred".to_string(),
                "Erreur interne du serveur".to_string(),
                None,
            ),
        };

        if status.is_server_error() {
            tracing::error!(code = self.code(), "Error: {:?}", self);
        } else {
            tracing::debug!(code = self.code(), "Error: {}", self);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message_en,
                message_fr,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
