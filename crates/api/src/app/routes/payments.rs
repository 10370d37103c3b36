use axum::{
    extract::{Extension, Path},
    middleware::from_fn,
    routing::{get, post},
    Json, Router,
};
use serde_json::{Value as JsonValue, json};

use storefront_auth::Permission;
use storefront_infra::Services;
use storefront_infra::integrations::{CreateIntent, RefundReason, RefundRequest};
use storefront_sales::OrderId;

use crate::app::dto::{CreateIntentRequest, RefundBody, parse_id};
use crate::app::errors::{ApiError, ApiResult};
use crate::authz::require_permission;
use crate::context::{PrincipalContext, TenantContext};
use crate::middleware::require_principal;

pub fn router() -> Router {
    let refunds = Router::new()
        .route("/refunds", post(refund))
        .route_layer(from_fn(require_principal));

    Router::new()
        .route("/intents", post(create_intent))
        .route("/verify/:transaction_id", get(verify))
        .merge(refunds)
}

/// Open a card payment intent. Signed-in callers are attached to a
/// provider-side customer and receive an ephemeral key.
pub async fn create_intent(
    Extension(services): Extension<Services>,
    principal: Option<Extension<PrincipalContext>>,
    Json(body): Json<CreateIntentRequest>,
) -> ApiResult<Json<JsonValue>> {
    let principal = principal.map(|Extension(p)| p);

    let mut metadata = body.metadata;
    metadata.insert(
        "userId".to_string(),
        principal
            .as_ref()
            .map_or_else(|| "guest".to_string(), |p| p.user_id().to_string()),
    );

    let request = CreateIntent {
        amount: body.amount,
        currency: body
            .currency
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| services.config.brand.currency.lowercase()),
        customer_id: body.customer_id,
        customer_email: principal.as_ref().and_then(|p| p.email().map(str::to_string)),
        customer_name: principal.as_ref().and_then(|p| p.name().map(str::to_string)),
        metadata,
    };
    request.validate()?;

    let intent = services.integrations.payments.create_intent(request).await?;
    tracing::info!(payment_intent = %intent.id, amount = intent.amount, "payment intent created");

    Ok(Json(json!({
        "clientSecret": intent.client_secret,
        "paymentIntentId": intent.id,
        "customerId": intent.customer_id,
        "ephemeralKey": intent.ephemeral_key,
    })))
}

pub async fn verify(
    Extension(services): Extension<Services>,
    Path(transaction_id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    let transaction_id = transaction_id.trim();
    if transaction_id.is_empty() {
        return Err(ApiError::bad_request("Transaction ID is required"));
    }
    let intent = services.integrations.payments.retrieve_intent(transaction_id).await?;

    Ok(Json(json!({
        "id": intent.id,
        "status": intent.status,
        "amount": intent.amount,
        "currency": intent.currency,
        "metadata": intent.metadata,
        "created": intent.created,
    })))
}

/// Refund a captured payment. When `orderId` is given the order moves to
/// refunded, returning its stock once, and its payment is marked refunded.
pub async fn refund(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<RefundBody>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::ORDERS_UPDATE)?;

    let payment_intent_id = body.transaction_id.trim().to_string();
    if payment_intent_id.is_empty() {
        return Err(ApiError::bad_request("Transaction ID is required"));
    }
    if body.amount.is_some_and(|a| a <= 0) {
        return Err(ApiError::bad_request("Refund amount must be positive"));
    }
    let order_id: Option<OrderId> = body.order_id.as_deref().map(|raw| parse_id(raw, "order")).transpose()?;

    let refund = services
        .integrations
        .payments
        .refund(RefundRequest {
            payment_intent_id,
            amount: body.amount,
            reason: RefundReason::from_client(body.reason.as_deref()),
        })
        .await?;
    tracing::info!(refund_id = %refund.id, amount = refund.amount, "refund issued");

    if let Some(order_id) = order_id {
        services
            .orders
            .record_refund(tenant.tenant_id(), order_id)
            .await?;
    }

    Ok(Json(json!({
        "success": true,
        "refundId": refund.id,
        "status": refund.status,
        "amount": refund.amount,
    })))
}
