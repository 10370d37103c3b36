use axum::{
    extract::{Extension, Query},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};

use storefront_ai::{ChatContext, LlmMessage, Locale, StoreProfile};
use storefront_core::TenantId;
use storefront_infra::store::prelude::*;
use storefront_infra::{Services, prompt_catalog};
use storefront_support::{ChatRole, Conversation, GuestInfo};

use crate::app::dto::{ChatRequest, ChatTurn, HistoryQuery, SaveMessageRequest};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common;
use crate::context::{PrincipalContext, TenantContext};

/// Turns of prior conversation sent to the model.
const MAX_HISTORY: usize = 20;

pub fn router() -> Router {
    Router::new()
        .route("/", post(chat))
        .route("/history", get(history))
        .route("/messages", post(save_message))
}

async fn chat_context(services: &Services, tenant_id: TenantId, principal: Option<&PrincipalContext>) -> ApiResult<ChatContext> {
    let Some(principal) = principal else {
        return Ok(ChatContext::guest());
    };
    let stored = services.store.get_profile(tenant_id, principal.user_id()).await?;
    let stored = stored.as_ref();

    Ok(ChatContext {
        user_id: Some(principal.user_id()),
        user_name: principal.name().map(str::to_string).or_else(|| stored.and_then(|p| p.name.clone())),
        user_phone: principal.phone().map(str::to_string).or_else(|| stored.and_then(|p| p.phone.clone())),
        user_email: principal.email().map(str::to_string).or_else(|| stored.and_then(|p| p.email.clone())),
    })
}

fn to_llm(turn: &ChatTurn) -> LlmMessage {
    match turn.role {
        ChatRole::User => LlmMessage::user(turn.content.clone()),
        ChatRole::Assistant => LlmMessage::assistant(turn.content.clone()),
    }
}

/// The session's conversation, or a new one owned by the caller. A session
/// bound to another account is refused.
async fn load_or_start(
    services: &Services,
    tenant_id: TenantId,
    session_id: &str,
    principal: Option<&PrincipalContext>,
) -> ApiResult<Conversation> {
    let caller = principal.map(PrincipalContext::user_id);
    match services.store.conversation_by_session(tenant_id, session_id).await? {
        Some(conversation) if conversation.user_id.is_some() && conversation.user_id != caller => {
            Err(ApiError::forbidden("conversation belongs to another account"))
        }
        Some(conversation) => Ok(conversation),
        None => Ok(Conversation::start(
            tenant_id,
            session_id,
            principal.map(PrincipalContext::user_id),
            Utc::now(),
        )?),
    }
}

/// Answer the latest user message with the assistant.
///
/// With a `sessionId`, the latest user message and the reply are appended to
/// that conversation's log. Another account's session is refused before the
/// model is called.
pub async fn chat(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    principal: Option<Extension<PrincipalContext>>,
    Json(body): Json<ChatRequest>,
) -> ApiResult<Json<JsonValue>> {
    let tenant_id = tenant.tenant_id();
    let principal = principal.map(|Extension(p)| p);

    let last_user = body
        .messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::User && !m.content.trim().is_empty())
        .cloned()
        .ok_or_else(|| ApiError::bad_request("messages must include a user message"))?;

    let conversation = match body.session_id.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(session_id) => Some(load_or_start(&services, tenant_id, session_id, principal.as_ref()).await?),
        None => None,
    };

    let context = chat_context(&services, tenant_id, principal.as_ref()).await?;
    let settings = common::settings(&services, tenant_id).await?;
    let assistant = services.assistant(StoreProfile {
        name: settings.store_name.clone(),
        phone: settings.store_phone.clone(),
        payment_methods: settings.payment_methods(),
    });
    let catalog = prompt_catalog(&services.store, tenant_id).await?;

    let skip = body.messages.len().saturating_sub(MAX_HISTORY);
    let history: Vec<LlmMessage> = body.messages.iter().skip(skip).map(to_llm).collect();
    let reply = assistant
        .respond(tenant_id, &context, Locale::parse(body.locale.as_deref()), history, &catalog)
        .await?;

    if let Some(mut conversation) = conversation {
        let now = Utc::now();
        conversation.append(ChatRole::User, &last_user.content, body.guest_info.as_ref(), now)?;
        if !reply.content.trim().is_empty() {
            conversation.append(ChatRole::Assistant, &reply.content, None, now)?;
        }
        if let Err(e) = services.store.save_conversation(&conversation).await {
            tracing::warn!(error = %e, "failed to save chat log");
        }
    }

    Ok(Json(json!({
        "content": reply.content,
        "toolInvocations": reply.tool_invocations,
        "steps": reply.steps,
    })))
}

/// A session's log. Sessions tied to another account read as empty.
pub async fn history(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    principal: Option<Extension<PrincipalContext>>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<JsonValue>> {
    let session_id = query
        .session_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing sessionId"))?;
    let caller = principal.map(|Extension(p)| p.user_id());

    let conversation = services
        .store
        .conversation_by_session(tenant.tenant_id(), &session_id)
        .await?
        .filter(|c| c.user_id.is_none() || c.user_id == caller);

    Ok(Json(match conversation {
        Some(c) => json!({ "messages": c.messages, "guestInfo": c.guest_info() }),
        None => json!({ "messages": [], "guestInfo": JsonValue::Null }),
    }))
}

/// Append one message to a session's log, creating the conversation on
/// first use.
pub async fn save_message(
    Extension(services): Extension<Services>,
    Extension(tenant): Extension<TenantContext>,
    principal: Option<Extension<PrincipalContext>>,
    Json(body): Json<SaveMessageRequest>,
) -> ApiResult<Json<JsonValue>> {
    if body.session_id.trim().is_empty() {
        return Err(ApiError::bad_request("Missing required fields"));
    }
    let principal = principal.map(|Extension(p)| p);
    let tenant_id = tenant.tenant_id();

    let mut conversation = load_or_start(&services, tenant_id, &body.session_id, principal.as_ref()).await?;
    let guest: Option<&GuestInfo> = body.guest_info.as_ref();
    conversation.append(body.message.role, &body.message.content, guest, Utc::now())?;
    services.store.save_conversation(&conversation).await?;

    Ok(Json(json!({ "success": true })))
}
