//! Crate-level error composition.
//!
//! The request client is the only retry boundary; once an `ApiError` reaches
//! an engine it is pass/fail for the current unit of work. `EngineError` just
//! joins the two underlying taxonomies at the orchestration seam.

use thiserror::Error;

use crate::api::ApiError;
use crate::db::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
