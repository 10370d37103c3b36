use axum::{
    extract::{Extension, Path, Query},
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};

use storefront_auth::Permission;
use storefront_core::PageRequest;
use storefront_infra::Services;
use storefront_infra::store::prelude::*;
use storefront_support::{ConversationId, TicketId, TicketStatus};

use crate::app::dto::{PageQuery, TicketStatusRequest, parse_id};
use crate::app::errors::{ApiError, ApiResult};
use crate::authz::require_permission;
use crate::context::{PrincipalContext, TenantContext};

const PREVIEW_LEN: usize = 120;

pub fn router() -> Router {
    Router::new()
        .route("/tickets", get(list_tickets))
        .route("/tickets/:id", patch(update_ticket_status))
        .route("/conversations", get(list_conversations))
        .route("/conversations/:id", get(get_conversation))
}

pub async fn list_tickets(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::TICKETS_MANAGE)?;
    let mut tickets = services.store.list_tickets(tenant.tenant_id()).await?;
    tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(json!(page.request().slice(tickets))))
}

pub async fn update_ticket_status(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<TicketStatusRequest>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::TICKETS_MANAGE)?;
    let id: TicketId = parse_id(&id, "ticket")?;
    let status = TicketStatus::parse(body.status.trim())
        .ok_or_else(|| ApiError::bad_request(format!("unknown ticket status '{}'", body.status)))?;

    let mut ticket = services
        .store
        .get_ticket(tenant.tenant_id(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket not found"))?;
    ticket.set_status(status, Utc::now());
    services.store.save_ticket(&ticket).await?;
    tracing::info!(ticket = ticket.ticket_number.as_str(), ?status, "ticket status changed");

    Ok(Json(json!({ "success": true, "ticket": ticket })))
}

/// Conversation summaries, most recently active first.
pub async fn list_conversations(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::CONVERSATIONS_READ)?;
    let mut conversations = services.store.list_conversations(tenant.tenant_id()).await?;
    conversations.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));

    let page = PageRequest::new(page.page, page.limit).slice(conversations).map(|c| {
        let preview: Option<String> = c
            .tail(1)
            .first()
            .map(|m| m.content.chars().take(PREVIEW_LEN).collect());
        json!({
            "id": c.id,
            "sessionId": c.session_id,
            "userId": c.user_id,
            "guestName": c.guest_name,
            "guestPhone": c.guest_phone,
            "messageCount": c.message_count,
            "lastMessageAt": c.last_message_at,
            "lastMessage": preview,
            "createdAt": c.created_at,
        })
    });
    Ok(Json(json!(page)))
}

pub async fn get_conversation(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    require_permission(&tenant, &principal, Permission::CONVERSATIONS_READ)?;
    let id: ConversationId = parse_id(&id, "conversation")?;
    let conversation = services
        .store
        .get_conversation(tenant.tenant_id(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Conversation not found"))?;
    Ok(Json(json!({ "conversation": conversation })))
}
