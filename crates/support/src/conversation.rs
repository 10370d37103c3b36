use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, TenantId, UserId, typed_id};

typed_id!(ConversationId);

pub const MAX_MESSAGE_LEN: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestInfo {
    pub name: String,
    pub phone: String,
}

/// A chat session log, keyed by the client-generated session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub tenant_id: TenantId,
    pub session_id: String,
    pub user_id: Option<UserId>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub message_count: u32,
    pub last_message_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn start(tenant_id: TenantId, session_id: &str, user_id: Option<UserId>, now: DateTime<Utc>) -> DomainResult<Self> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(DomainError::required("sessionId"));
        }
        Ok(Self {
            id: ConversationId::generate(),
            tenant_id,
            session_id: session_id.to_string(),
            user_id,
            guest_name: None,
            guest_phone: None,
            message_count: 0,
            last_message_at: now,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Append a message. Guest details fill in only fields not yet set.
    pub fn append(
        &mut self,
        role: ChatRole,
        content: &str,
        guest: Option<&GuestInfo>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if content.trim().is_empty() {
            return Err(DomainError::required("message content"));
        }
        if content.chars().count() > MAX_MESSAGE_LEN {
            return Err(DomainError::validation(format!("message exceeds {MAX_MESSAGE_LEN} characters")));
        }

        if let Some(g) = guest {
            if self.guest_name.is_none() && !g.name.trim().is_empty() {
                self.guest_name = Some(g.name.trim().to_string());
            }
            if self.guest_phone.is_none() && !g.phone.trim().is_empty() {
                self.guest_phone = Some(g.phone.trim().to_string());
            }
        }

        self.messages.push(ChatMessage { role, content: content.to_string(), created_at: now });
        self.message_count = self.message_count.saturating_add(1);
        self.last_message_at = now;
        self.updated_at = now;
        Ok(())
    }

    pub fn guest_info(&self) -> Option<GuestInfo> {
        if self.guest_name.is_none() && self.guest_phone.is_none() {
            return None;
        }
        Some(GuestInfo {
            name: self.guest_name.clone().unwrap_or_else(|| "Guest".to_string()),
            phone: self.guest_phone.clone().unwrap_or_default(),
        })
    }

    /// Last `n` messages, oldest first.
    pub fn tail(&self, n: usize) -> &[ChatMessage] {
        &self.messages[self.messages.len().saturating_sub(n)..]
    }
}
