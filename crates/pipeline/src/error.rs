use provider::ProviderError;
use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

pub use shared::error::UnknownCategoryError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{dimension} category listing is empty; cannot present a selector")]
    Empty { dimension: &'static str },
    #[error("failed to list {dimension} categories: {source}")]
    Provider {
        dimension: &'static str,
        #[source]
        source: ProviderError,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategoryError),
}

impl From<&PipelineError> for ApiError {
    fn from(value: &PipelineError) -> Self {
        match value {
            PipelineError::Provider(err) => ApiError::new(ErrorCode::Provider, err.to_string()),
            PipelineError::UnknownCategory(err) => err.into(),
        }
    }
}
