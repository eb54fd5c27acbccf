use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Provider,
    UnknownCategory,
    Validation,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A value outside a closed category set. Signals catalog/data drift.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} category '{value}'")]
pub struct UnknownCategoryError {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownCategoryError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl From<&UnknownCategoryError> for ApiError {
    fn from(value: &UnknownCategoryError) -> Self {
        Self::new(ErrorCode::UnknownCategory, value.to_string())
    }
}
