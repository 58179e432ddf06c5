use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::profile::Role;

/// Compte externe émis par le fournisseur d'authentification.
/// Immuable de notre point de vue (hors refresh de token).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Métadonnées posées par le fournisseur OAuth (nom affiché, avatar)
/// ou par nous au sign-up (rôle demandé).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}
