// Persistance locale de la session (paire access/refresh + identité)

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::models::identity::Identity;

/// Marge avant expiration pour ne pas envoyer un token mourant.
const EXPIRY_LEEWAY_SECONDS: i64 = 30;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: Identity,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_LEEWAY_SECONDS) >= self.expires_at
    }
}

/// Stockage de la session courante: un slot en mémoire adossé à un fichier
/// JSON. Toutes les écritures disque sont best-effort: une session non
/// persistée reste utilisable pour la durée du processus.
pub struct SessionStore {
    path: PathBuf,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        SessionStore {
            path,
            current: RwLock::new(None),
        }
    }

    /// Recharge la session persistée au démarrage. Un fichier absent ou
    /// corrompu n'est pas une erreur: on repart simplement déconnecté.
    pub async fn restore(&self) -> Option<Session> {
        let raw = tokio::fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => {
                *self.current.write().await = Some(session.clone());
                Some(session)
            }
            Err(e) => {
                log::warn!("discarding corrupt session file {}: {e}", self.path.display());
                None
            }
        }
    }

    pub async fn get(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn set(&self, session: Session) {
        *self.current.write().await = Some(session.clone());
        match serde_json::to_string(&session) {
            Ok(raw) => {
                if let Err(e) = tokio::fs::write(&self.path, raw).await {
                    log::warn!("failed to persist session to {}: {e}", self.path.display());
                }
            }
            Err(e) => log::warn!("failed to serialize session: {e}"),
        }
    }

    /// Efface la session locale. Ne peut pas échouer du point de vue de
    /// l'appelant: un fichier déjà absent compte comme effacé.
    pub async fn clear(&self) {
        *self.current.write().await = None;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to remove session file {}: {e}", self.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_session_path() -> PathBuf {
        std::env::temp_dir().join(format!("nexad_session_{}.json", Uuid::new_v4()))
    }

    fn sample_session() -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            user: Identity {
                id: Uuid::new_v4(),
                email: Some("jane@example.edu".to_string()),
                user_metadata: Default::default(),
            },
        }
    }

    #[tokio::test]
    async fn test_set_then_restore_roundtrip() {
        let path = temp_session_path();
        let store = SessionStore::new(path.clone());
        let session = sample_session();
        store.set(session.clone()).await;

        // Un second store sur le même fichier doit retrouver la session
        let other = SessionStore::new(path.clone());
        let restored = other.restore().await.unwrap();
        assert_eq!(restored.access_token, session.access_token);
        assert_eq!(restored.user.id, session.user.id);

        store.clear().await;
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_clear_removes_file_and_memory() {
        let path = temp_session_path();
        let store = SessionStore::new(path.clone());
        store.set(sample_session()).await;
        store.clear().await;
        assert!(store.get().await.is_none());
        assert!(tokio::fs::read_to_string(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_clear_on_missing_file_is_fine() {
        let store = SessionStore::new(temp_session_path());
        store.clear().await;
        assert!(store.get().await.is_none());
    }

    #[test]
    fn test_expiry_leeway() {
        let mut session = sample_session();
        session.expires_at = Utc::now() + Duration::seconds(5);
        assert!(session.is_expired());
        session.expires_at = Utc::now() + Duration::hours(1);
        assert!(!session.is_expired());
    }
}
