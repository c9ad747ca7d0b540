pub mod equipment_audit;


use axum::{
    extract::{FromRequest, FromRequestParts},
    response::Json,
};
use serde_json::{json, Value};

use crate::error::AppError;

/// JSON body whose rejections use the API error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejections use the API error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
