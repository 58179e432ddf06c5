// DTOs: pagination + payloads d'écriture validés avant d'atteindre le backend

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::consultation::{ConsultationTopic, TimeSlot, Urgency};
use crate::models::message::MessageType;
use crate::models::profile::{NotificationPreferences, OfficeHours, Role};

/// Fenêtre de pagination demandée. Les indices sont inclusifs, comme le
/// `Range` attendu par l'API du backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        PageRequest {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn from_index(&self) -> u32 {
        (self.page - 1) * self.per_page
    }

    pub fn to_index(&self) -> u32 {
        self.from_index() + self.per_page - 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::new(1, 10)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: u64, page: &PageRequest) -> Self {
        Paginated {
            data,
            total,
            page: page.page,
            per_page: page.per_page,
            total_pages: total.div_ceil(page.per_page as u64),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct NewConsultationRequest {
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    pub topic: ConsultationTopic,
    #[validate(length(min = 1, message = "subject_line is required"))]
    pub subject_line: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    pub urgency: Urgency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_time_slots: Option<Vec<TimeSlot>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultation_request_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announcement_id: Option<Uuid>,
}

/// Données saisies au sign-up, routées vers la table de profil du rôle.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SignUpData {
    pub role: Option<Role>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub student_id: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub year_level: Option<i32>,
    pub profile_photo_url: Option<String>,
    pub expertise_tags: Option<Vec<String>>,
    pub bio: Option<String>,
}

/// Payload d'insertion d'un profil étudiant. Les champs absents sont omis
/// du JSON pour laisser jouer les défauts côté backend.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StudentDraft {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_preferences: Option<NotificationPreferences>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TeacherDraft {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expertise_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub office_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub office_hours: Option<Vec<OfficeHours>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_consultations_per_day: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultation_duration_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_response_time_hours: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_accepting_consultations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_preferences: Option<NotificationPreferences>,
}

/// Mise à jour partielle d'un profil étudiant.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StudentProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_preferences: Option<NotificationPreferences>,
}

/// Mise à jour partielle d'un profil enseignant.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TeacherProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expertise_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub office_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub office_hours: Option<Vec<OfficeHours>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_accepting_consultations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_preferences: Option<NotificationPreferences>,
}

/// Mise à jour routée selon le rôle résolu.
#[derive(Clone, Debug)]
pub enum ProfileUpdate {
    Student(StudentProfileUpdate),
    Teacher(TeacherProfileUpdate),
}
