// Configuration au démarrage

use std::env;
use std::path::PathBuf;

const DEFAULT_CALLBACK_PORT: u16 = 8765;
const DEFAULT_SESSION_FILE: &str = ".nexad_session.json";
const DEFAULT_MAX_FILE_SIZE_MB: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub session_file: PathBuf,
    pub callback_port: u16,
    pub max_file_size_mb: u64,
}

impl Config {
    /// Lit la configuration depuis l'environnement.
    /// SUPABASE_URL et SUPABASE_ANON_KEY sont obligatoires: leur absence
    /// est une erreur fatale au démarrage, pas une condition récupérable.
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .expect("SUPABASE_URL must be set in .env file");
        let supabase_anon_key = env::var("SUPABASE_ANON_KEY")
            .expect("SUPABASE_ANON_KEY must be set in .env file");

        let session_file = env::var("NEXAD_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SESSION_FILE));

        let callback_port = env::var("NEXAD_CALLBACK_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_CALLBACK_PORT);

        let max_file_size_mb = env::var("NEXAD_MAX_FILE_SIZE_MB")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_MAX_FILE_SIZE_MB);

        Config {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_anon_key,
            session_file,
            callback_port,
            max_file_size_mb,
        }
    }

    /// URL de callback OAuth servie par le listener local (équivalent
    /// desktop du deep link `app://auth/callback` de l'app mobile).
    pub fn redirect_url(&self) -> String {
        format!("http://127.0.0.1:{}/auth/callback", self.callback_port)
    }
}
