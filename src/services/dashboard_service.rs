// Tableaux de bord: chargements indépendants lancés en parallèle puis
// assemblés en un seul view-model. Un échec sur l'un des volets fait
// échouer la vue entière.

use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::consultation::{ConsultationRequest, ConsultationStatus};
use crate::models::dto::PageRequest;
use crate::models::message::Message;
use crate::models::profile::{StudentProfile, TeacherProfile};
use crate::services::consultation_service::ConsultationService;
use crate::services::message_service::MessageService;
use crate::services::notification_service::NotificationService;
use crate::services::profile_service::ProfileService;
use crate::supabase::SupabaseClient;

const CONSULTATION_LIMIT: u32 = 5;
const MESSAGE_LIMIT: u32 = 5;

#[derive(Debug)]
pub struct StudentOverview {
    pub profile: Option<StudentProfile>,
    pub consultations: Vec<ConsultationRequest>,
    pub unread_messages: Vec<Message>,
    pub unread_notifications: u64,
}

#[derive(Debug)]
pub struct TeacherOverview {
    pub profile: Option<TeacherProfile>,
    pub pending_requests: Vec<ConsultationRequest>,
    pub upcoming_appointments: Vec<ConsultationRequest>,
    pub unread_messages: Vec<Message>,
    pub unread_notifications: u64,
}

pub struct DashboardService;

impl DashboardService {
    /// Vue étudiante: quatre ressources chargées de front.
    pub async fn student_overview(
        client: &SupabaseClient,
        user_id: Uuid,
    ) -> Result<StudentOverview, ServiceError> {
        let (consultations, unread_messages, unread_notifications, profile) = futures::join!(
            ConsultationService::student_requests(
                client,
                user_id,
                &PageRequest::new(1, CONSULTATION_LIMIT)
            ),
            MessageService::unread(client, user_id, MESSAGE_LIMIT),
            NotificationService::unread_count(client, user_id),
            ProfileService::student_profile(client, user_id),
        );

        Ok(StudentOverview {
            consultations: consultations?.data,
            unread_messages: unread_messages?,
            unread_notifications: unread_notifications?,
            profile: profile?,
        })
    }

    /// Vue enseignante: cinq ressources, demandes en attente et rendez-vous
    /// acceptés compris.
    pub async fn teacher_overview(
        client: &SupabaseClient,
        user_id: Uuid,
    ) -> Result<TeacherOverview, ServiceError> {
        let (pending, unread_messages, unread_notifications, profile, upcoming) = futures::join!(
            ConsultationService::teacher_requests(
                client,
                user_id,
                Some(ConsultationStatus::Pending),
                &PageRequest::new(1, CONSULTATION_LIMIT)
            ),
            MessageService::unread(client, user_id, MESSAGE_LIMIT),
            NotificationService::unread_count(client, user_id),
            ProfileService::teacher_profile(client, user_id),
            ConsultationService::teacher_requests(
                client,
                user_id,
                Some(ConsultationStatus::Accepted),
                &PageRequest::new(1, CONSULTATION_LIMIT)
            ),
        );

        Ok(TeacherOverview {
            pending_requests: pending?.data,
            upcoming_appointments: upcoming?.data,
            unread_messages: unread_messages?,
            unread_notifications: unread_notifications?,
            profile: profile?,
        })
    }
}
