//! Recommendation collaborator seam.
//!
//! The core consumes a strategy object only; concrete scoring lives with
//! the collaborator. The before-handle hook picks the strategy for the
//! current request and attaches it to the context.

use serde_json::Value;

use crate::common::error::RequestError;
use crate::router::Context;

/// A recommendation strategy bound to the per-request context.
pub trait Strategy: Send + Sync {
    /// Record that the current user liked or disliked an item.
    fn update(&self, ctx: &Context, item_id: i64, liked: bool) -> Result<(), RequestError>;

    /// Produce the next item to show the current user.
    fn next(&self, ctx: &Context) -> Result<Value, RequestError>;
}
