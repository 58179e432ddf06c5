// Endpoints d'authentification du backend hébergé

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use url::Url;
use uuid::Uuid;

use super::{error_from_response, SupabaseClient, SupabaseError};
use crate::models::identity::Identity;
use crate::models::profile::Role;
use crate::session::Session;
use crate::utils::jwt;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: Identity,
}

/// Réponse du signup. Selon la configuration du backend, une session est
/// ouverte immédiatement (auto-confirm) ou l'identité revient seule en
/// attendant la confirmation par email.
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<Identity>,
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    email: Option<String>,
}

impl SupabaseClient {
    fn auth_endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base(), path)
    }

    async fn token_request(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, SupabaseError> {
        let response = self
            .http()
            .post(self.auth_endpoint("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", self.anon_key())
            .bearer_auth(self.anon_key())
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let token: TokenResponse = response.json().await?;
        let session = Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            user: token.user,
        };
        self.session().set(session.clone()).await;
        Ok(session)
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, SupabaseError> {
        self.token_request("password", json!({ "email": email, "password": password }))
            .await
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, SupabaseError> {
        self.token_request("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    /// Crée le compte d'auth, le rôle demandé rangé dans les métadonnées
    /// utilisateur pour la création de profil qui suit.
    pub async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<(Identity, Option<Session>), SupabaseError> {
        let response = self
            .http()
            .post(self.auth_endpoint("signup"))
            .header("apikey", self.anon_key())
            .bearer_auth(self.anon_key())
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "role": role },
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: SignUpResponse = response.json().await?;
        match body {
            SignUpResponse {
                access_token: Some(access_token),
                refresh_token: Some(refresh_token),
                expires_in,
                user: Some(user),
                ..
            } => {
                let session = Session {
                    access_token,
                    refresh_token,
                    expires_at: Utc::now() + Duration::seconds(expires_in.unwrap_or(3600)),
                    user: user.clone(),
                };
                self.session().set(session.clone()).await;
                Ok((user, Some(session)))
            }
            SignUpResponse { user: Some(user), .. } => Ok((user, None)),
            SignUpResponse { id: Some(id), email, .. } => Ok((
                Identity {
                    id,
                    email,
                    user_metadata: Default::default(),
                },
                None,
            )),
            _ => Err(SupabaseError::Api {
                code: None,
                message: "User creation failed".to_string(),
            }),
        }
    }

    /// Envoie un magic link (connexion sans mot de passe). Le rôle voyage
    /// dans les métadonnées pour la création de profil au retour.
    pub async fn send_magic_link(
        &self,
        email: &str,
        role: Role,
        redirect_to: &str,
    ) -> Result<(), SupabaseError> {
        let response = self
            .http()
            .post(self.auth_endpoint("otp"))
            .query(&[("redirect_to", redirect_to)])
            .header("apikey", self.anon_key())
            .bearer_auth(self.anon_key())
            .json(&json!({
                "email": email,
                "create_user": true,
                "data": { "role": role },
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    /// URL d'autorisation du fournisseur OAuth, callback local inclus.
    pub fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String, SupabaseError> {
        Url::parse_with_params(
            &self.auth_endpoint("authorize"),
            &[
                ("provider", provider),
                ("redirect_to", redirect_to),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map(|url| url.to_string())
        .map_err(|e| SupabaseError::Api {
            code: None,
            message: format!("invalid backend URL: {e}"),
        })
    }

    /// Matérialise une session à partir des tokens extraits d'un callback.
    /// L'identité est lue dans les claims du token d'accès.
    pub async fn establish_session_from_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, SupabaseError> {
        let claims = jwt::decode_claims(access_token).map_err(|message| SupabaseError::Api {
            code: None,
            message,
        })?;

        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at: DateTime::from_timestamp(claims.exp, 0)
                .unwrap_or_else(|| Utc::now() + Duration::hours(1)),
            user: claims.identity(),
        };
        self.session().set(session.clone()).await;
        Ok(session)
    }

    /// Identité courante relue depuis le backend (quand les claims du token
    /// ne portent pas les métadonnées nécessaires).
    pub async fn fetch_identity(&self) -> Result<Identity, SupabaseError> {
        let response = self
            .http()
            .get(self.auth_endpoint("user"))
            .header("apikey", self.anon_key())
            .bearer_auth(self.access_token().await)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response.json().await?)
    }

    pub async fn sign_out_remote(&self) -> Result<(), SupabaseError> {
        let response = self
            .http()
            .post(self.auth_endpoint("logout"))
            .header("apikey", self.anon_key())
            .bearer_auth(self.access_token().await)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supabase::test_client;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_password_grant_persists_session() {
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

        let client = test_client(&server.base_url());
        let session = client
            .sign_in_with_password("jane@example.edu", "hunter2")
            .await
            .unwrap();

        assert_eq!(session.user.id, user_id);
        let stored = client.session().get().await.unwrap();
        assert_eq!(stored.access_token, "at-1");
        let _ = tokio::fs::remove_file(&client.config().session_file).await;
    }

    #[tokio::test]
    async fn test_bad_credentials_surface_backend_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/token");
                then.status(400)
                    .json_body(json!({ "error_description": "Invalid login credentials" }));
            })
            .await;

        let client = test_client(&server.base_url());
        let err = client
            .sign_in_with_password("jane@example.edu", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[test]
    fn test_authorize_url_contains_provider_and_redirect() {
        let client = test_client("http://127.0.0.1:9");
        let url = client
            .authorize_url("google", "http://127.0.0.1:8765/auth/callback")
            .unwrap();
        assert!(url.starts_with("http://127.0.0.1:9/auth/v1/authorize?"));
        assert!(url.contains("provider=google"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("redirect_to=http%3A%2F%2F127.0.0.1%3A8765%2Fauth%2Fcallback"));
    }
}
