use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    ConsultationChat,
    AnnouncementReply,
    TeacherInquiry,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub message_type: MessageType,
    #[serde(default)]
    pub consultation_request_id: Option<Uuid>,
    #[serde(default)]
    pub announcement_id: Option<Uuid>,
    pub content: String,
    #[serde(default)]
    pub attached_file_ids: Option<Vec<Uuid>>,
    pub is_read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
