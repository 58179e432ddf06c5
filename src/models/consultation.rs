use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Statuts du cycle de vie d'une demande.
/// `ai_processing` et `awaiting_teacher` existent dans le schéma mais ne
/// sont produits par aucune opération ici.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Pending,
    AiProcessing,
    AwaitingTeacher,
    Accepted,
    Declined,
    Completed,
    Cancelled,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Pending => "pending",
            ConsultationStatus::AiProcessing => "ai_processing",
            ConsultationStatus::AwaitingTeacher => "awaiting_teacher",
            ConsultationStatus::Accepted => "accepted",
            ConsultationStatus::Declined => "declined",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationTopic {
    Academic,
    Career,
    Personal,
    Administrative,
    Research,
    MentalHealth,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Urgent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsultationRequest {
    pub id: Uuid,
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    pub topic: ConsultationTopic,
    pub subject_line: String,
    pub description: String,
    pub urgency: Urgency,
    pub status: ConsultationStatus,
    #[serde(default)]
    pub preferred_time_slots: Option<Vec<TimeSlot>>,
    #[serde(default)]
    pub scheduled_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub teacher_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
