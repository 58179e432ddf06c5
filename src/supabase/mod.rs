// ============================================================================
// SUPABASE - CLIENT REST DU BACKEND HÉBERGÉ
// ============================================================================
//
// Poignée unique vers le backend (auth + tables + storage), passée à tous
// les services. Trois sous-modules:
//   - auth : endpoints d'authentification (password, signup, otp, refresh)
//   - postgrest : lectures/écritures filtrées sur les tables
//   - storage : dépôt de fichiers + URLs signées
//
// ============================================================================

pub mod auth;
pub mod postgrest;
pub mod storage;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::session::SessionStore;
use postgrest::QueryBuilder;

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("{message}")]
    Api {
        code: Option<String>,
        message: String,
    },
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

impl SupabaseError {
    /// Violation de contrainte unique (insertion concurrente).
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, SupabaseError::Api { code: Some(code), .. } if code == "23505")
    }
}

/// Corps d'erreur du backend. PostgREST emploie code/message, l'API d'auth
/// msg/error_description: on prend ce qui est présent.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

pub(crate) async fn error_from_response(response: reqwest::Response) -> SupabaseError {
    let status = response.status();
    match response.json::<ApiErrorBody>().await {
        Ok(body) => SupabaseError::Api {
            code: body.code,
            message: body
                .message
                .or(body.msg)
                .or(body.error_description)
                .or(body.error)
                .unwrap_or_else(|| format!("HTTP {status}")),
        },
        Err(_) => SupabaseError::Api {
            code: None,
            message: format!("HTTP {status}"),
        },
    }
}

pub struct SupabaseClient {
    http: reqwest::Client,
    config: Config,
    session: SessionStore,
    refresh_lock: Mutex<()>,
}

impl SupabaseClient {
    pub fn new(config: Config) -> Self {
        let session = SessionStore::new(config.session_file.clone());
        SupabaseClient {
            http: reqwest::Client::new(),
            config,
            session,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn base(&self) -> &str {
        &self.config.supabase_url
    }

    pub(crate) fn anon_key(&self) -> &str {
        &self.config.supabase_anon_key
    }

    /// Point d'entrée des requêtes sur une table, à la manière d'un ORM:
    /// `client.from("messages").eq("recipient_id", id).fetch().await`
    pub fn from(&self, table: &str) -> QueryBuilder<'_> {
        QueryBuilder::new(self, table)
    }

    /// Token à présenter au backend: la session courante (rafraîchie si
    /// expirée), sinon la clé publique anonyme.
    pub(crate) async fn access_token(&self) -> String {
        let Some(session) = self.session.get().await else {
            return self.config.supabase_anon_key.clone();
        };
        if !session.is_expired() {
            return session.access_token;
        }

        // Sérialise les refresh concurrents: le premier arrivé rafraîchit,
        // les suivants relisent la session mise à jour.
        let _guard = self.refresh_lock.lock().await;
        if let Some(current) = self.session.get().await {
            if !current.is_expired() {
                return current.access_token;
            }
            match self.refresh_session(&current.refresh_token).await {
                Ok(renewed) => return renewed.access_token,
                Err(e) => log::warn!("session refresh failed: {e}"),
            }
        }
        self.config.supabase_anon_key.clone()
    }
}

#[cfg(test)]
pub(crate) fn test_client(base_url: &str) -> SupabaseClient {
    let config = Config {
        supabase_url: base_url.trim_end_matches('/').to_string(),
        supabase_anon_key: "test-anon-key".to_string(),
        session_file: std::env::temp_dir()
            .join(format!("nexad_test_session_{}.json", uuid::Uuid::new_v4())),
        callback_port: 8765,
        max_file_size_mb: 10,
    };
    SupabaseClient::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::Identity;
    use crate::session::Session;
    use chrono::{Duration, Utc};
    use httpmock::prelude::*;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_expired_session_is_refreshed_before_a_table_call() {
        let server = MockServer::start_async().await;
        let user_id = Uuid::new_v4();
        let refresh = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/token")
                    .query_param("grant_type", "refresh_token");
                then.status(200).json_body(json!({
                    "access_token": "at-new",
                    "refresh_token": "rt-new",
                    "expires_in": 3600,
                    "user": { "id": user_id, "email": "jane@example.edu" }
                }));
            })
            .await;
        let table = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/messages")
                    .header("authorization", "Bearer at-new");
                then.status(200).json_body(json!([]));
            })
            .await;

        let client = test_client(&server.base_url());
        client
            .session()
            .set(Session {
                access_token: "at-old".to_string(),
                refresh_token: "rt-old".to_string(),
                expires_at: Utc::now() - Duration::minutes(5),
                user: Identity {
                    id: user_id,
                    email: None,
                    user_metadata: Default::default(),
                },
            })
            .await;

        let rows: Vec<serde_json::Value> = client.from("messages").fetch().await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(refresh.hits_async().await, 1);
        assert_eq!(table.hits_async().await, 1);

        let _ = tokio::fs::remove_file(&client.config().session_file).await;
    }

    #[tokio::test]
    async fn test_without_session_the_anon_key_is_the_bearer() {
        let server = MockServer::start_async().await;
        let table = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/messages")
                    .header("apikey", "test-anon-key")
                    .header("authorization", "Bearer test-anon-key");
                then.status(200).json_body(json!([]));
            })
            .await;

        let client = test_client(&server.base_url());
        let rows: Vec<serde_json::Value> = client.from("messages").fetch().await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(table.hits_async().await, 1);
    }
}
