// Messagerie: envoi, boîtes de réception/envoi, marquage lu

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::error::ServiceError;
use crate::models::dto::{NewMessage, PageRequest, Paginated};
use crate::models::message::Message;
use crate::supabase::SupabaseClient;

const TABLE: &str = "messages";

pub struct MessageService;

impl MessageService {
    pub async fn send_message(
        client: &SupabaseClient,
        message: &NewMessage,
    ) -> Result<Message, ServiceError> {
        message
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let mut body =
            serde_json::to_value(message).map_err(|e| ServiceError::Backend(e.to_string()))?;
        body["is_read"] = json!(false);
        Ok(client.from(TABLE).insert(&body).await?)
    }

    /// Boîte de réception, les plus récents d'abord.
    pub async fn inbox(
        client: &SupabaseClient,
        user_id: Uuid,
        page: &PageRequest,
    ) -> Result<Paginated<Message>, ServiceError> {
        let (rows, total) = client
            .from(TABLE)
            .eq("recipient_id", user_id)
            .order("created_at", false)
            .range(page.from_index(), page.to_index())
            .fetch_with_count()
            .await?;
        Ok(Paginated::new(rows, total, page))
    }

    /// Messages non lus, bornés (aperçu du tableau de bord).
    pub async fn unread(
        client: &SupabaseClient,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<Message>, ServiceError> {
        Ok(client
            .from(TABLE)
            .eq("recipient_id", user_id)
            .eq("is_read", false)
            .order("created_at", false)
            .limit(limit)
            .fetch()
            .await?)
    }

    pub async fn unread_count(
        client: &SupabaseClient,
        user_id: Uuid,
    ) -> Result<u64, ServiceError> {
        Ok(client
            .from(TABLE)
            .eq("recipient_id", user_id)
            .eq("is_read", false)
            .count()
            .await?)
    }

    /// Fil d'une consultation, en ordre chronologique.
    pub async fn consultation_messages(
        client: &SupabaseClient,
        consultation_request_id: Uuid,
        page: &PageRequest,
    ) -> Result<Paginated<Message>, ServiceError> {
        let (rows, total) = client
            .from(TABLE)
            .eq("consultation_request_id", consultation_request_id)
            .order("created_at", true)
            .range(page.from_index(), page.to_index())
            .fetch_with_count()
            .await?;
        Ok(Paginated::new(rows, total, page))
    }

    pub async fn mark_as_read(
        client: &SupabaseClient,
        message_id: Uuid,
    ) -> Result<Message, ServiceError> {
        Ok(client
            .from(TABLE)
            .eq("id", message_id)
            .update(&json!({ "is_read": true, "read_at": Utc::now() }))
            .await?)
    }

    pub async fn mark_all_as_read(
        client: &SupabaseClient,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        Ok(client
            .from(TABLE)
            .eq("recipient_id", user_id)
            .eq("is_read", false)
            .update_void(&json!({ "is_read": true, "read_at": Utc::now() }))
            .await?)
    }

    pub async fn sent(
        client: &SupabaseClient,
        user_id: Uuid,
        page: &PageRequest,
    ) -> Result<Paginated<Message>, ServiceError> {
        let (rows, total) = client
            .from(TABLE)
            .eq("sender_id", user_id)
            .order("created_at", false)
            .range(page.from_index(), page.to_index())
            .fetch_with_count()
            .await?;
        Ok(Paginated::new(rows, total, page))
    }

    /// Seuls ses propres messages envoyés peuvent être supprimés.
    pub async fn delete_message(
        client: &SupabaseClient,
        message_id: Uuid,
        sender_id: Uuid,
    ) -> Result<(), ServiceError> {
        Ok(client
            .from(TABLE)
            .eq("id", message_id)
            .eq("sender_id", sender_id)
            .delete()
            .await?)
    }
}
