//! `storefront-ai`
//!
//! **Responsibility:** the storefront chat assistant.
//!
//! - The model only reaches customer data through the tools defined here.
//! - Every tool enforces ownership against the [`ChatContext`]; the model's
//!   arguments are never trusted for identity.
//! - Storage and the LLM provider sit behind traits ([`ToolBackend`],
//!   [`LlmClient`]) implemented by infra.

pub mod assistant;
pub mod context;
pub mod error;
pub mod i18n;
pub mod llm;
pub mod prompt;
pub mod tools;

pub use assistant::{ChatAssistant, ChatReply, MAX_STEPS, ToolInvocation};
pub use context::{ChatContext, Locale};
pub use error::AiError;
pub use llm::{LlmClient, LlmMessage, LlmRequest, LlmResponse, LlmRole, ToolCall, ToolSpec};
pub use prompt::{CatalogEntry, MAX_PROMPT_PRODUCTS, StoreProfile, system_prompt};
pub use tools::{ChatTool, OrderReference, OrderSnapshot, ToolBackend, ToolExecutor, tool_specs};
