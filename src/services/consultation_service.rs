// Demandes de consultation: création par l'étudiant, décision et
// planification par l'enseignant.

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::error::ServiceError;
use crate::models::consultation::{ConsultationRequest, ConsultationStatus};
use crate::models::dto::{NewConsultationRequest, PageRequest, Paginated};
use crate::supabase::SupabaseClient;

const TABLE: &str = "consultation_requests";

pub struct ConsultationService;

impl ConsultationService {
    /// Crée une nouvelle demande (le statut initial est posé côté backend).
    pub async fn create_request(
        client: &SupabaseClient,
        request: &NewConsultationRequest,
    ) -> Result<ConsultationRequest, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;
        Ok(client.from(TABLE).insert(request).await?)
    }

    /// Demandes d'un étudiant, les plus récentes d'abord.
    pub async fn student_requests(
        client: &SupabaseClient,
        student_id: Uuid,
        page: &PageRequest,
    ) -> Result<Paginated<ConsultationRequest>, ServiceError> {
        let (rows, total) = client
            .from(TABLE)
            .eq("student_id", student_id)
            .order("created_at", false)
            .range(page.from_index(), page.to_index())
            .fetch_with_count()
            .await?;
        Ok(Paginated::new(rows, total, page))
    }

    /// Demandes reçues par un enseignant, filtrables par statut.
    pub async fn teacher_requests(
        client: &SupabaseClient,
        teacher_id: Uuid,
        status: Option<ConsultationStatus>,
        page: &PageRequest,
    ) -> Result<Paginated<ConsultationRequest>, ServiceError> {
        let mut query = client.from(TABLE).eq("teacher_id", teacher_id);
        if let Some(status) = status {
            query = query.eq("status", status.as_str());
        }
        let (rows, total) = query
            .order("created_at", false)
            .range(page.from_index(), page.to_index())
            .fetch_with_count()
            .await?;
        Ok(Paginated::new(rows, total, page))
    }

    /// Corps de mise à jour de statut: accepted pose la date de revue,
    /// completed la date de clôture.
    fn status_update_body(
        status: ConsultationStatus,
        extra: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> serde_json::Value {
        let mut body = json!({ "status": status });
        match status {
            ConsultationStatus::Accepted => {
                body["teacher_reviewed_at"] = json!(now);
            }
            ConsultationStatus::Completed => {
                body["completed_at"] = json!(now);
            }
            _ => {}
        }
        if let Some(serde_json::Value::Object(extra)) = extra {
            for (key, value) in extra {
                body[key.as_str()] = value;
            }
        }
        body
    }

    pub async fn update_status(
        client: &SupabaseClient,
        request_id: Uuid,
        status: ConsultationStatus,
        extra: Option<serde_json::Value>,
    ) -> Result<ConsultationRequest, ServiceError> {
        let body = Self::status_update_body(status, extra, Utc::now());
        Ok(client.from(TABLE).eq("id", request_id).update(&body).await?)
    }

    pub async fn request(
        client: &SupabaseClient,
        request_id: Uuid,
    ) -> Result<ConsultationRequest, ServiceError> {
        Ok(client.from(TABLE).eq("id", request_id).single().await?)
    }

    /// Planifie le créneau et accepte la demande d'un même geste.
    pub async fn schedule(
        client: &SupabaseClient,
        request_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ConsultationRequest, ServiceError> {
        let body = json!({
            "scheduled_start_time": start,
            "scheduled_end_time": end,
            "status": ConsultationStatus::Accepted,
            "teacher_reviewed_at": Utc::now(),
        });
        Ok(client.from(TABLE).eq("id", request_id).update(&body).await?)
    }

    /// Consultations acceptées d'un enseignant, par heure de début.
    pub async fn approved_consultations(
        client: &SupabaseClient,
        teacher_id: Uuid,
    ) -> Result<Vec<ConsultationRequest>, ServiceError> {
        Ok(client
            .from(TABLE)
            .eq("teacher_id", teacher_id)
            .eq("status", ConsultationStatus::Accepted.as_str())
            .order("scheduled_start_time", true)
            .fetch()
            .await?)
    }
}
