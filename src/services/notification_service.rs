// Notifications: consommées seulement, produites côté backend

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::notification::Notification;
use crate::supabase::SupabaseClient;

const TABLE: &str = "notifications";
const DEFAULT_FEED_LIMIT: u32 = 20;

pub struct NotificationService;

impl NotificationService {
    /// Fil de notifications d'un utilisateur, les plus récentes d'abord.
    pub async fn user_notifications(
        client: &SupabaseClient,
        user_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>, ServiceError> {
        Ok(client
            .from(TABLE)
            .eq("user_id", user_id)
            .order("created_at", false)
            .limit(limit.unwrap_or(DEFAULT_FEED_LIMIT))
            .fetch()
            .await?)
    }

    pub async fn mark_as_read(
        client: &SupabaseClient,
        notification_id: Uuid,
    ) -> Result<(), ServiceError> {
        Ok(client
            .from(TABLE)
            .eq("id", notification_id)
            .update_void(&json!({ "is_read": true, "read_at": Utc::now() }))
            .await?)
    }

    pub async fn unread_count(
        client: &SupabaseClient,
        user_id: Uuid,
    ) -> Result<u64, ServiceError> {
        Ok(client
            .from(TABLE)
            .eq("user_id", user_id)
            .eq("is_read", false)
            .count()
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supabase::test_client;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_feed_uses_default_limit() {
        let server = MockServer::start_async().await;
        let user_id = Uuid::new_v4();
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/notifications")
                    .query_param("user_id", format!("eq.{user_id}"))
                    .query_param("limit", "20");
                then.status(200).json_body(json!([]));
            })
            .await;

        let client = test_client(&server.base_url());
        let feed = NotificationService::user_notifications(&client, user_id, None)
            .await
            .unwrap();
        assert!(feed.is_empty());
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_unread_count() {
        let server = MockServer::start_async().await;
        let user_id = Uuid::new_v4();
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::HEAD)
                    .path("/rest/v1/notifications")
                    .query_param("is_read", "eq.false");
                then.status(200).header("content-range", "*/12");
            })
            .await;

        let client = test_client(&server.base_url());
        let count = NotificationService::unread_count(&client, user_id)
            .await
            .unwrap();
        assert_eq!(count, 12);
    }
}
