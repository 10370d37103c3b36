//! Customer support module: support tickets and chat conversation logs.

pub mod conversation;
pub mod ticket;

pub use conversation::{ChatMessage, ChatRole, Conversation, ConversationId, GuestInfo};
pub use ticket::{
    SupportTicket, TicketCategory, TicketContact, TicketDraft, TicketId, TicketNumber, TicketPriority, TicketStatus,
};
