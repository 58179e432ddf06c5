// Orchestrateur du flux d'authentification: handoff OAuth, ouverture de
// session, résolution/provisionnement du profil.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::dto::{ProfileUpdate, SignUpData, StudentDraft, TeacherDraft};
use crate::models::profile::{Profile, Role};
use crate::services::browser::{BrowserResult, BrowserSession};
use crate::services::profile_service::ProfileService;
use crate::session::Session;
use crate::supabase::SupabaseClient;
use crate::utils::callback;

/// États du flux de sign-in OAuth. Le flux avance strictement dans cet
/// ordre; l'échec est terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AuthFlowState {
    Idle,
    OauthRedirecting,
    OauthAwaitingCallback,
    SessionPending,
    ProfileResolving,
    Ready,
    Failed,
}

/// Borne du polling de session: 20 tentatives espacées de 500 ms, soit
/// 10 s au total avant d'abandonner.
const POLL_ATTEMPTS: u32 = 20;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

const OAUTH_PROVIDER: &str = "google";

pub struct AuthService {
    client: Arc<SupabaseClient>,
    /// Dernière résolution de profil. C'est la clef de dédoublonnage entre
    /// le retour direct de l'orchestrateur et le chemin passif du callback:
    /// les deux convergent sur `on_session_established`, et la seconde
    /// arrivée pour la même identité réutilise la première résolution.
    resolved: Mutex<Option<(Uuid, Profile)>>,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl AuthService {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        AuthService {
            client,
            resolved: Mutex::new(None),
            poll_interval: POLL_INTERVAL,
            poll_attempts: POLL_ATTEMPTS,
        }
    }

    #[cfg(test)]
    fn with_polling(client: Arc<SupabaseClient>, interval: Duration, attempts: u32) -> Self {
        AuthService {
            client,
            resolved: Mutex::new(None),
            poll_interval: interval,
            poll_attempts: attempts,
        }
    }

    fn transition(state: &mut AuthFlowState, next: AuthFlowState) {
        log::debug!("auth flow: {:?} -> {:?}", state, next);
        *state = next;
    }

    /// Sign-in via le fournisseur OAuth. Le rôle demandé est un paramètre
    /// qui voyage avec le flux: il n'existe aucun état global "rôle en
    /// attente" à poser avant la redirection.
    pub async fn sign_in_with_oauth(
        &self,
        requested_role: Role,
        browser: &dyn BrowserSession,
    ) -> Result<Profile, ServiceError> {
        let redirect_url = self.client.config().redirect_url();
        let mut state = AuthFlowState::Idle;

        // 1. URL d'autorisation du fournisseur, callback local en retour
        Self::transition(&mut state, AuthFlowState::OauthRedirecting);
        let authorize_url = self.client.authorize_url(OAUTH_PROVIDER, &redirect_url)?;

        // 2. Passage par le navigateur
        Self::transition(&mut state, AuthFlowState::OauthAwaitingCallback);
        log::info!("🔵 waiting for the OAuth callback on {redirect_url}");
        let outcome = match browser.authenticate(&authorize_url, &redirect_url).await {
            BrowserResult::Success { callback_url } => {
                // 3. Extraire les tokens et ouvrir la session. Un échec ici
                //    n'est pas terminal: les tokens ont pu être livrés au
                //    handler de callback indépendant, donc on bascule sur
                //    le polling au lieu d'échouer tout de suite.
                match self.establish_from_callback(&callback_url).await {
                    Ok(session) => Ok(session),
                    Err(e) => {
                        log::warn!("🟡 token extraction failed ({e}); polling for a session");
                        self.poll_for_session(&redirect_url).await
                    }
                }
            }
            // 4. Refus explicite de l'utilisateur: échec immédiat, sans polling
            BrowserResult::Cancel => Err(ServiceError::Cancelled),
            // 5. Fermeture sans réponse: le callback a pu aboutir ailleurs
            BrowserResult::Dismiss => self.poll_for_session(&redirect_url).await,
        };

        let session = match outcome {
            Ok(session) => session,
            Err(e) => {
                Self::transition(&mut state, AuthFlowState::Failed);
                log::info!("🔴 sign-in failed: {e}");
                return Err(e);
            }
        };
        Self::transition(&mut state, AuthFlowState::SessionPending);

        // 6. Résolution du profil (provisionnement si premier sign-in)
        Self::transition(&mut state, AuthFlowState::ProfileResolving);
        let profile = self.on_session_established(&session, requested_role).await?;

        // 7. Session prête, profil attaché
        Self::transition(&mut state, AuthFlowState::Ready);
        log::info!("🟢 signed in as {} ({})", profile.email(), profile.role());
        Ok(profile)
    }

    async fn establish_from_callback(&self, callback_url: &str) -> Result<Session, ServiceError> {
        let tokens = callback::extract_tokens(callback_url).map_err(ServiceError::Backend)?;
        Ok(self
            .client
            .establish_session_from_tokens(&tokens.access_token, &tokens.refresh_token)
            .await?)
    }

    /// Boucle de polling bornée: la session a pu être ouverte par le
    /// handler de callback indépendant pendant que le navigateur fermait.
    async fn poll_for_session(&self, redirect_url: &str) -> Result<Session, ServiceError> {
        for attempt in 1..=self.poll_attempts {
            if let Some(session) = self.client.session().get().await {
                log::info!("🟢 session detected after {attempt} poll attempt(s)");
                return Ok(session);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(ServiceError::Timeout {
            redirect_url: redirect_url.to_string(),
        })
    }

    /// Point de convergence unique de la résolution de profil. Les arrivées
    /// répétées pour une même identité (orchestrateur + chemin passif)
    /// réutilisent la première résolution au lieu de refaire le travail.
    pub async fn on_session_established(
        &self,
        session: &Session,
        default_role: Role,
    ) -> Result<Profile, ServiceError> {
        let mut resolved = self.resolved.lock().await;
        if let Some((user_id, profile)) = resolved.as_ref() {
            if *user_id == session.user.id {
                log::debug!("profile already resolved for {user_id}; skipping duplicate resolution");
                return Ok(profile.clone());
            }
        }

        let profile = match ProfileService::resolve_role(&self.client, session.user.id).await? {
            Some(profile) => {
                match profile.role() {
                    Role::Student => {
                        ProfileService::touch_student_login(&self.client, session.user.id).await
                    }
                    _ => ProfileService::touch_teacher_login(&self.client, session.user.id).await,
                }
                profile
            }
            None => {
                // Premier sign-in: provisionner. Les claims du token ne
                // portent pas toujours les métadonnées du fournisseur, on
                // relit l'identité au besoin.
                let identity = if session.user.user_metadata.full_name.is_none() {
                    match self.client.fetch_identity().await {
                        Ok(identity) => identity,
                        Err(e) => {
                            log::warn!("could not refresh identity metadata: {e}");
                            session.user.clone()
                        }
                    }
                } else {
                    session.user.clone()
                };
                // Le rôle posé dans les métadonnées au sign-up (magic link)
                // prime sur le défaut du flux
                let role = identity.user_metadata.role.unwrap_or(default_role);
                ProfileService::provision(&self.client, &identity, role).await?
            }
        };

        *resolved = Some((session.user.id, profile.clone()));
        Ok(profile)
    }

    /// Sign-in email + mot de passe. Le profil doit déjà exister.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Profile, ServiceError> {
        let session = self.client.sign_in_with_password(email, password).await?;

        let profile = ProfileService::resolve_role(&self.client, session.user.id)
            .await?
            .ok_or(ServiceError::ProfileMissing)?;

        match profile.role() {
            Role::Student => {
                ProfileService::touch_student_login(&self.client, session.user.id).await
            }
            _ => ProfileService::touch_teacher_login(&self.client, session.user.id).await,
        }

        *self.resolved.lock().await = Some((session.user.id, profile.clone()));
        Ok(profile)
    }

    /// Sign-up: compte d'auth puis profil dans la table du rôle choisi.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        data: SignUpData,
    ) -> Result<Profile, ServiceError> {
        let role = data.role.unwrap_or(Role::Student);
        let (identity, _session) = self
            .client
            .sign_up_with_password(email, password, role)
            .await?;

        let profile = match role {
            Role::Teacher => {
                let draft = TeacherDraft {
                    email: email.to_string(),
                    first_name: data.first_name.clone().unwrap_or_default(),
                    last_name: data.last_name.clone().unwrap_or_default(),
                    phone: data.phone.clone(),
                    department: data.department.clone(),
                    profile_photo_url: data.profile_photo_url.clone(),
                    expertise_tags: data.expertise_tags.clone(),
                    bio: data.bio.clone(),
                    ..Default::default()
                };
                Profile::Teacher(
                    ProfileService::create_teacher_profile(&self.client, identity.id, &draft)
                        .await?,
                )
            }
            _ => {
                let draft = StudentDraft {
                    email: email.to_string(),
                    first_name: data.first_name.clone().unwrap_or_default(),
                    last_name: data.last_name.clone().unwrap_or_default(),
                    student_id: data.student_id.clone(),
                    phone: data.phone.clone(),
                    department: data.department.clone(),
                    year_level: data.year_level,
                    profile_photo_url: data.profile_photo_url.clone(),
                    ..Default::default()
                };
                Profile::Student(
                    ProfileService::create_student_profile(&self.client, identity.id, &draft)
                        .await?,
                )
            }
        };

        *self.resolved.lock().await = Some((identity.id, profile.clone()));
        Ok(profile)
    }

    /// Envoie un magic link; la session arrivera par le chemin passif du
    /// callback.
    pub async fn sign_in_with_magic_link(
        &self,
        email: &str,
        role: Role,
    ) -> Result<(), ServiceError> {
        let redirect_url = self.client.config().redirect_url();
        Ok(self
            .client
            .send_magic_link(email, role, &redirect_url)
            .await?)
    }

    /// Profil attaché à la session courante.
    pub async fn current_user(&self) -> Result<Profile, ServiceError> {
        let session = self
            .client
            .session()
            .get()
            .await
            .ok_or(ServiceError::NoSession)?;
        ProfileService::resolve_role(&self.client, session.user.id)
            .await?
            .ok_or(ServiceError::ProfileMissing)
    }

    /// Mise à jour de profil routée vers la table du rôle.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Profile, ServiceError> {
        let profile = match update {
            ProfileUpdate::Student(updates) => Profile::Student(
                ProfileService::update_student_profile(&self.client, user_id, &updates).await?,
            ),
            ProfileUpdate::Teacher(updates) => Profile::Teacher(
                ProfileService::update_teacher_profile(&self.client, user_id, &updates).await?,
            ),
        };

        let mut resolved = self.resolved.lock().await;
        if matches!(resolved.as_ref(), Some((id, _)) if *id == user_id) {
            *resolved = Some((user_id, profile.clone()));
        }
        Ok(profile)
    }

    /// Sign-out. L'appel distant est best-effort: les données locales sont
    /// toujours effacées et l'appel rapporte un succès.
    pub async fn sign_out(&self) -> Result<(), ServiceError> {
        if let Err(e) = self.client.sign_out_remote().await {
            log::warn!("remote sign-out failed ({e}); clearing the local session anyway");
        }
        self.client.session().clear().await;
        *self.resolved.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::{Identity, UserMetadata};
    use crate::supabase::test_client;
    use crate::utils::jwt::Claims;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use httpmock::prelude::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    struct StaticBrowser(BrowserResult);

    #[async_trait]
    impl BrowserSession for StaticBrowser {
        async fn authenticate(&self, _authorize_url: &str, _redirect_url: &str) -> BrowserResult {
            self.0.clone()
        }
    }

    fn make_access_token(user_id: Uuid, email: &str, full_name: &str) -> String {
        let claims = Claims {
            sub: user_id,
            email: Some(email.to_string()),
            exp: (Utc::now() + ChronoDuration::hours(1)).timestamp(),
            user_metadata: UserMetadata {
                full_name: Some(full_name.to_string()),
                avatar_url: None,
                role: None,
            },
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"not-our-secret"),
        )
        .unwrap()
    }

    fn student_row(user_id: Uuid) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "user_id": user_id,
            "email": "jane@example.edu",
            "first_name": "Jane",
            "last_name": "Doe",
            "created_at": "2026-01-10T09:00:00+00:00",
            "updated_at": "2026-01-10T09:00:00+00:00",
            "is_active": true
        })
    }

    fn future_session(user_id: Uuid) -> Session {
        Session {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_at: Utc::now() + ChronoDuration::hours(1),
            user: Identity {
                id: user_id,
                email: Some("jane@example.edu".to_string()),
                user_metadata: UserMetadata {
                    full_name: Some("Jane Doe".to_string()),
                    avatar_url: None,
                    role: None,
                },
            },
        }
    }

    async fn mock_profile_tables(server: &MockServer, user_id: Uuid) {
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/student_profiles")
                    .query_param("user_id", format!("eq.{user_id}"));
                then.status(200).json_body(json!([student_row(user_id)]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/teacher_profiles");
                then.status(200).json_body(json!([]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PATCH).path("/rest/v1/student_profiles");
                then.status(204);
            })
            .await;
    }

    #[tokio::test]
    async fn test_cancel_fails_immediately_without_polling() {
        // Base injoignable: le chemin d'annulation ne doit rien appeler
        let client = Arc::new(test_client("http://127.0.0.1:9"));
        let auth = AuthService::new(client);

        let started = std::time::Instant::now();
        let err = auth
            .sign_in_with_oauth(Role::Student, &StaticBrowser(BrowserResult::Cancel))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Cancelled));
        assert!(started.elapsed() < POLL_INTERVAL);
    }

    #[tokio::test]
    async fn test_dismiss_polls_to_exhaustion_then_times_out() {
        let client = Arc::new(test_client("http://127.0.0.1:9"));
        let auth = AuthService::with_polling(client, Duration::from_millis(5), 20);

        let started = std::time::Instant::now();
        let err = auth
            .sign_in_with_oauth(Role::Student, &StaticBrowser(BrowserResult::Dismiss))
            .await
            .unwrap_err();

        // 20 tentatives consommées avant l'abandon, avec l'URL attendue en
        // indication de remédiation
        assert!(started.elapsed() >= Duration::from_millis(100));
        match err {
            ServiceError::Timeout { redirect_url } => {
                assert!(redirect_url.ends_with("/auth/callback"));
            }
            other => panic!("expected a timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_with_fragment_tokens_reaches_ready() {
        let server = MockServer::start_async().await;
        let user_id = Uuid::new_v4();
        mock_profile_tables(&server, user_id).await;

        let client = Arc::new(test_client(&server.base_url()));
        let auth = AuthService::new(client.clone());

        let token = make_access_token(user_id, "jane@example.edu", "Jane Doe");
        let callback_url = format!(
            "http://127.0.0.1:8765/auth/callback#access_token={token}&refresh_token=rt-1"
        );
        let profile = auth
            .sign_in_with_oauth(
                Role::Student,
                &StaticBrowser(BrowserResult::Success { callback_url }),
            )
            .await
            .unwrap();

        assert_eq!(profile.role(), Role::Student);
        assert_eq!(profile.user_id(), user_id);

        // La session extraite du callback est bien celle attachée
        let session = client.session().get().await.unwrap();
        assert_eq!(session.access_token, token);
        assert_eq!(session.user.id, user_id);

        let _ = tokio::fs::remove_file(&client.config().session_file).await;
    }

    #[tokio::test]
    async fn test_error_callback_falls_through_to_polling() {
        let client = Arc::new(test_client("http://127.0.0.1:9"));
        let auth = AuthService::with_polling(client, Duration::from_millis(2), 3);

        let callback_url =
            "http://127.0.0.1:8765/auth/callback?error=access_denied&error_description=denied"
                .to_string();
        let err = auth
            .sign_in_with_oauth(
                Role::Student,
                &StaticBrowser(BrowserResult::Success { callback_url }),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_on_session_established_dedupes_by_identity() {
        let server = MockServer::start_async().await;
        let user_id = Uuid::new_v4();
        let student_get = server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/student_profiles").query_param_exists("user_id");
                then.status(200).json_body(json!([student_row(user_id)]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/teacher_profiles");
                then.status(200).json_body(json!([]));
            })
            .await;
        let touch = server
            .mock_async(|when, then| {
                when.method(PATCH).path("/rest/v1/student_profiles");
                then.status(204);
            })
            .await;

        let client = Arc::new(test_client(&server.base_url()));
        let auth = AuthService::new(client);
        let session = future_session(user_id);

        let first = auth
            .on_session_established(&session, Role::Student)
            .await
            .unwrap();
        let second = auth
            .on_session_established(&session, Role::Student)
            .await
            .unwrap();

        assert_eq!(first, second);
        // La seconde arrivée ne refait ni lecture ni touch
        assert_eq!(student_get.hits_async().await, 1);
        assert_eq!(touch.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_sign_out_clears_local_session_even_when_backend_fails() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/logout");
                then.status(500).json_body(json!({ "msg": "backend exploded" }));
            })
            .await;

        let client = Arc::new(test_client(&server.base_url()));
        client.session().set(future_session(Uuid::new_v4())).await;
        let auth = AuthService::new(client.clone());

        auth.sign_out().await.unwrap();
        assert!(client.session().get().await.is_none());
    }

    #[tokio::test]
    async fn test_password_sign_in_requires_existing_profile() {
        let server = MockServer::start_async().await;
        let user_id = Uuid::new_v4();
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/token")
                    .query_param("grant_type", "password");
                then.status(200).json_body(json!({
                    "access_token": "at-1",
                    "refresh_token": "rt-1",
                    "expires_in": 3600,
                    "user": { "id": user_id, "email": "jane@example.edu" }
                }));
            })
            .await;
        for table in ["student_profiles", "teacher_profiles"] {
            server
                .mock_async(|when, then| {
                    when.method(GET).path(format!("/rest/v1/{table}"));
                    then.status(200).json_body(json!([]));
                })
                .await;
        }

        let client = Arc::new(test_client(&server.base_url()));
        let auth = AuthService::new(client.clone());

        let err = auth.sign_in("jane@example.edu", "hunter2").await.unwrap_err();
        assert!(matches!(err, ServiceError::ProfileMissing));

        let _ = tokio::fs::remove_file(&client.config().session_file).await;
    }
}
