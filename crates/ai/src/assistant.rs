//! The tool-calling conversation loop.

use serde::Serialize;
use serde_json::Value as JsonValue;

use storefront_core::TenantId;

use crate::i18n::Msg;
use crate::{
    AiError, CatalogEntry, ChatContext, LlmClient, LlmMessage, LlmRequest, Locale, StoreProfile, ToolBackend,
    ToolExecutor, system_prompt, tool_specs,
};

/// Model round-trips allowed per user message.
pub const MAX_STEPS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub name: String,
    pub result: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub content: String,
    pub tool_invocations: Vec<ToolInvocation>,
    pub steps: usize,
}

pub struct ChatAssistant<L: ?Sized, B: ?Sized> {
    llm: std::sync::Arc<L>,
    backend: std::sync::Arc<B>,
    store: StoreProfile,
}

impl<L, B> ChatAssistant<L, B>
where
    L: LlmClient + ?Sized,
    B: ToolBackend + ?Sized,
{
    pub fn new(llm: std::sync::Arc<L>, backend: std::sync::Arc<B>, store: StoreProfile) -> Self {
        Self { llm, backend, store }
    }

    /// Answer the latest user message given the prior `history`.
    ///
    /// Tool calls are executed and fed back until the model answers in text
    /// or [`MAX_STEPS`] is reached.
    #[tracing::instrument(skip_all, fields(tenant_id = %tenant_id, logged_in = context.is_logged_in()))]
    pub async fn respond(
        &self,
        tenant_id: TenantId,
        context: &ChatContext,
        locale: Locale,
        history: Vec<LlmMessage>,
        catalog: &[CatalogEntry],
    ) -> Result<ChatReply, AiError> {
        if history.is_empty() {
            return Err(AiError::InvalidInput("messages must not be empty".into()));
        }

        let executor = ToolExecutor::new(self.backend.as_ref(), tenant_id, context, locale);
        let system = system_prompt(&self.store, catalog, context, locale);
        let tools = tool_specs(locale);
        let mut messages = history;
        let mut invocations = Vec::new();

        for step in 1..=MAX_STEPS {
            let response = self
                .llm
                .complete(LlmRequest { system: system.clone(), messages: messages.clone(), tools: tools.clone() })
                .await?;

            if response.tool_calls.is_empty() {
                let content = response.content.unwrap_or_default();
                tracing::debug!(step, tools = invocations.len(), "chat answered");
                return Ok(ChatReply { content, tool_invocations: invocations, steps: step });
            }

            messages.push(LlmMessage::assistant_tool_calls(response.tool_calls.clone()));
            for call in &response.tool_calls {
                let result = executor.execute(call).await;
                tracing::info!(tool = %call.name, success = %result["success"], "chat tool executed");
                messages.push(LlmMessage::tool_result(call.id.clone(), &result));
                invocations.push(ToolInvocation { name: call.name.clone(), result });
            }
        }

        tracing::warn!(max_steps = MAX_STEPS, "chat step limit reached");
        Ok(ChatReply { content: Msg::StepLimit.render(locale), tool_invocations: invocations, steps: MAX_STEPS })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;
    use storefront_core::UserId;
    use storefront_support::SupportTicket;

    use crate::{LlmResponse, LlmRole, OrderReference, OrderSnapshot, ToolCall};

    struct ScriptedLlm {
        replies: Mutex<VecDeque<LlmResponse>>,
        seen: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<LlmResponse>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, AiError> {
            self.seen.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AiError::InferenceFailed("script exhausted".into()))
        }
    }

    struct NoOrders;

    #[async_trait]
    impl ToolBackend for NoOrders {
        async fn recent_orders(&self, _: TenantId, _: UserId, _: usize) -> Result<Vec<OrderSnapshot>, AiError> {
            Ok(vec![])
        }

        async fn find_order(&self, _: TenantId, _: OrderReference) -> Result<Option<OrderSnapshot>, AiError> {
            Ok(None)
        }

        async fn save_ticket(&self, _: SupportTicket) -> Result<(), AiError> {
            Ok(())
        }
    }

    fn store() -> StoreProfile {
        StoreProfile { name: "Dhaka Cafe".into(), phone: "1".into(), payment_methods: vec!["COD".into()] }
    }

    fn orders_call() -> LlmResponse {
        LlmResponse::calls(vec![ToolCall { id: "c1".into(), name: "getCustomerOrders".into(), arguments: json!({}) }])
    }

    #[tokio::test]
    async fn tool_results_are_fed_back_before_the_answer() {
        let llm = ScriptedLlm::new(vec![orders_call(), LlmResponse::text("You have no orders yet.")]);
        let assistant = ChatAssistant::new(llm.clone(), Arc::new(NoOrders), store());
        let ctx = ChatContext { user_id: Some(UserId::new()), ..ChatContext::guest() };

        let reply = assistant
            .respond(TenantId::new(), &ctx, Locale::En, vec![LlmMessage::user("show my orders")], &[])
            .await
            .unwrap();

        assert_eq!(reply.content, "You have no orders yet.");
        assert_eq!(reply.steps, 2);
        assert_eq!(reply.tool_invocations[0].result["success"], true);

        let seen = llm.seen.lock().unwrap();
        let second = &seen[1].messages;
        assert_eq!(second.len(), 3);
        assert_eq!(second[2].role, LlmRole::Tool);
        assert_eq!(second[2].tool_call_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn stops_after_max_steps() {
        let llm = ScriptedLlm::new((0..MAX_STEPS + 2).map(|_| orders_call()).collect());
        let assistant = ChatAssistant::new(llm.clone(), Arc::new(NoOrders), store());

        let reply = assistant
            .respond(TenantId::new(), &ChatContext::guest(), Locale::En, vec![LlmMessage::user("loop")], &[])
            .await
            .unwrap();

        assert_eq!(reply.steps, MAX_STEPS);
        assert_eq!(reply.tool_invocations.len(), MAX_STEPS);
        assert_eq!(llm.seen.lock().unwrap().len(), MAX_STEPS);
        assert_eq!(reply.tool_invocations[0].result["success"], false);
    }

    #[tokio::test]
    async fn empty_history_is_rejected() {
        let assistant = ChatAssistant::new(ScriptedLlm::new(vec![]), Arc::new(NoOrders), store());
        let err = assistant.respond(TenantId::new(), &ChatContext::guest(), Locale::En, vec![], &[]).await;
        assert!(matches!(err, Err(AiError::InvalidInput(_))));
    }
}
