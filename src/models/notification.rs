use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Types de notifications produites côté backend.
/// Ce client les consomme seulement, il n'en génère aucune.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    RequestSubmitted,
    RequestAccepted,
    RequestDeclined,
    ConsultationReminder,
    NewMessage,
    ClassroomAnnouncement,
    AttachmentBinCreated,
    DocumentUploaded,
    AiBriefReady,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub consultation_request_id: Option<Uuid>,
    #[serde(default)]
    pub classroom_id: Option<Uuid>,
    #[serde(default)]
    pub announcement_id: Option<Uuid>,
    #[serde(default)]
    pub action_url: Option<String>,
    pub is_read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
