use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::constants::LEARNER_ID_HEADER;
use crate::response::AppError;

/// A wrapper around `axum::Json<T>` that returns `AppError` on deserialization failure
/// instead of Axum's default plain-text rejection.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection_to_app_error(rejection)),
        }
    }
}

fn json_rejection_to_app_error(rejection: JsonRejection) -> AppError {
    tracing::warn!(error = %rejection, "Rejected JSON request body");
    AppError::bad_request("INVALID_REQUEST_BODY", "Invalid request body")
}

/// Learner identity forwarded by the gateway in `x-learner-id`.
#[derive(Debug, Clone)]
pub struct LearnerId(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for LearnerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(LEARNER_ID_HEADER)
            .ok_or_else(|| AppError::bad_request("MISSING_LEARNER_ID", "Missing x-learner-id header"))?;
        let value = raw
            .to_str()
            .map_err(|_| AppError::bad_request("INVALID_LEARNER_ID", "Invalid x-learner-id header"))?
            .trim();
        if value.is_empty() || value.contains(':') {
            return Err(AppError::bad_request(
                "INVALID_LEARNER_ID",
                "Invalid x-learner-id header",
            ));
        }
        Ok(LearnerId(value.to_string()))
    }
}
