use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value as JsonValue, json};

use storefront_ai::AiError;
use storefront_auth::AuthzError;
use storefront_core::DomainError;
use storefront_infra::{CheckoutError, IntegrationError, RepositoryError};
use storefront_sales::CouponRejection;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error response: `{ "error": code, "message": text }` plus optional
/// structured details merged into the body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<JsonValue>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.code,
            "message": self.message,
        });
        if let (Some(JsonValue::Object(extra)), Some(obj)) = (self.details, body.as_object_mut()) {
            obj.extend(extra);
        }
        (self.status, axum::Json(body)).into_response()
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    ApiError::new(status, code, message).into_response()
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ApiError::bad_request(msg),
            DomainError::InvariantViolation(msg) => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
            }
            DomainError::InvalidId(msg) => ApiError::new(StatusCode::BAD_REQUEST, "invalid_id", msg),
            DomainError::NotFound => ApiError::not_found("not found"),
            DomainError::Conflict(msg) => ApiError::new(StatusCode::CONFLICT, "conflict", msg),
            DomainError::Unauthorized => ApiError::forbidden("unauthorized"),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => ApiError::new(StatusCode::CONFLICT, "conflict", msg),
            RepositoryError::NotFound => ApiError::not_found("not found"),
            other => ApiError::internal(other),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        ApiError::forbidden(err.to_string())
    }
}

impl From<CouponRejection> for ApiError {
    fn from(err: CouponRejection) -> Self {
        let api = ApiError::new(StatusCode::BAD_REQUEST, "invalid_coupon", err.to_string());
        match err {
            CouponRejection::BelowMinimum { minimum, .. } => api.with_details(json!({ "minOrderAmount": minimum })),
            _ => api,
        }
    }
}

impl From<IntegrationError> for ApiError {
    fn from(err: IntegrationError) -> Self {
        match err {
            IntegrationError::Disabled(what) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                format!("{what} is not configured"),
            ),
            IntegrationError::InvalidRequest(msg) => ApiError::bad_request(msg),
            other => {
                tracing::warn!(error = %other, "integration call failed");
                ApiError::new(StatusCode::BAD_GATEWAY, "upstream_error", other.to_string())
            }
        }
    }
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::InvalidInput(msg) => ApiError::bad_request(msg),
            AiError::Unavailable(msg) => ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg),
            AiError::InferenceFailed(msg) => {
                tracing::warn!(error = %msg, "chat inference failed");
                ApiError::new(StatusCode::BAD_GATEWAY, "upstream_error", "chat service failed to respond")
            }
            AiError::Backend(msg) => ApiError::internal(msg),
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Validation(msg) => ApiError::bad_request(msg),
            CheckoutError::ProductNotFound(product_id) => ApiError::not_found("Product not found")
                .with_details(json!({ "productId": product_id })),
            CheckoutError::InsufficientStock {
                product_id,
                name,
                requested,
                available,
            } => ApiError::new(
                StatusCode::BAD_REQUEST,
                "insufficient_stock",
                format!("Insufficient stock for {name}"),
            )
            .with_details(json!({
                "productId": product_id,
                "requested": requested,
                "available": available,
            })),
            CheckoutError::Coupon(rejection) => rejection.into(),
            CheckoutError::Payment(err) => match err {
                IntegrationError::InvalidRequest(msg) => {
                    ApiError::new(StatusCode::BAD_REQUEST, "payment_failed", msg)
                }
                other => other.into(),
            },
            CheckoutError::Domain(err) => err.into(),
            CheckoutError::Repository(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_catalog::ProductId;
    use storefront_core::Money;

    async fn body(err: ApiError) -> (StatusCode, JsonValue) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn insufficient_stock_carries_details() {
        let product_id = ProductId::generate();
        let (status, json) = body(
            CheckoutError::InsufficientStock {
                product_id,
                name: "Kacchi".into(),
                requested: 4,
                available: 1,
            }
            .into(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "insufficient_stock");
        assert_eq!(json["message"], "Insufficient stock for Kacchi");
        assert_eq!(json["requested"], 4);
        assert_eq!(json["available"], 1);
        assert_eq!(json["productId"], product_id.to_string());
    }

    #[tokio::test]
    async fn status_mapping() {
        assert_eq!(ApiError::from(DomainError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(DomainError::conflict("slug")).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(RepositoryError::Backend("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(IntegrationError::Disabled("stripe")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ApiError::from(AuthzError::TenantMismatch).status(), StatusCode::FORBIDDEN);

        let (status, json) = body(
            CouponRejection::BelowMinimum {
                minimum: Money::from_major(500),
                display: "BDT 500.00".into(),
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["minOrderAmount"], 50_000);
    }
}
