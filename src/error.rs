use thiserror::Error;

/// Erreur uniforme retournée par tous les services.
/// Les erreurs backend/transport remontent leur message tel quel;
/// les cas OAuth (annulation, timeout) ont leur propre variante pour
/// que l'UI puisse les distinguer.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Backend(String),

    /// Violation de contrainte unique non récupérée (insertion concurrente
    /// d'un profil). Normalement absorbée par le provisioner, jamais montrée
    /// à l'utilisateur pendant le sign-in.
    #[error("{0}")]
    Conflict(String),

    #[error("Authentication cancelled by user")]
    Cancelled,

    #[error(
        "Authentication did not complete. Waited for a callback on {redirect_url}. \
         Finish the sign-in in your browser and try again."
    )]
    Timeout { redirect_url: String },

    #[error("{0}")]
    Validation(String),

    #[error("User profile not found. Please sign up first.")]
    ProfileMissing,

    #[error("No active session")]
    NoSession,
}

impl From<crate::supabase::SupabaseError> for ServiceError {
    fn from(err: crate::supabase::SupabaseError) -> Self {
        if err.is_unique_violation() {
            ServiceError::Conflict(err.to_string())
        } else {
            ServiceError::Backend(err.to_string())
        }
    }
}
