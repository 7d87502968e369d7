use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ChatMessage is an append-only message between warehouse users.
/// A message without a recipient is a broadcast to the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: uuid::Uuid,
    pub warehouse_id: uuid::Uuid,
    pub sender_id: uuid::Uuid,
    pub recipient_id: Option<uuid::Uuid>,
    pub message_text: String,
    pub message_type: String,
    pub is_broadcast: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    // Sender and recipient profiles, joined client-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<ProfileSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ProfileSummary>,
}

impl ChatMessage {
    /// Returns true if `user_id` sent or may read this message.
    pub fn is_visible_to(&self, user_id: uuid::Uuid) -> bool {
        self.is_broadcast
            || self.recipient_id.is_none()
            || self.sender_id == user_id
            || self.recipient_id == Some(user_id)
    }
}

/// ProfileSummary is the subset of a Profile shown alongside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub full_name: String,
    pub employee_id: String,
    pub role: crate::Role,
}

/// NewChatMessage is the inserted shape of a ChatMessage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChatMessage {
    pub warehouse_id: uuid::Uuid,
    pub sender_id: uuid::Uuid,
    pub recipient_id: Option<uuid::Uuid>,
    pub message_text: String,
    pub message_type: String,
    pub is_broadcast: bool,
}
