mod config;
mod error;
mod models;
mod routes;
mod services;
mod session;
mod supabase;
mod utils;

use std::env;
use std::sync::Arc;

use models::profile::{Profile, Role};
use services::auth_service::AuthService;
use services::browser::SystemBrowser;
use services::dashboard_service::DashboardService;
use supabase::SupabaseClient;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = config::Config::from_env();
    println!("🔌 Connecting to {}", config.supabase_url);
    let client = Arc::new(SupabaseClient::new(config));
    let _ = client.session().restore().await;

    let auth = AuthService::new(client.clone());
    match auth.current_user().await {
        Ok(profile) => {
            println!("✅ Signed in as {} ({})", profile.full_name(), profile.role());
            print_dashboard(&client, &profile).await;
        }
        Err(_) => {
            let role = env::var("NEXAD_ROLE")
                .ok()
                .and_then(|r| r.parse().ok())
                .unwrap_or(Role::Student);
            println!("🔵 No active session, starting OAuth sign-in as {role}");

            let browser = SystemBrowser::new(client.config().callback_port);
            match auth.sign_in_with_oauth(role, &browser).await {
                Ok(profile) => {
                    println!("🟢 Welcome, {} ({})", profile.full_name(), profile.role());
                    print_dashboard(&client, &profile).await;
                }
                Err(e) => eprintln!("🔴 Sign-in failed: {e}"),
            }
        }
    }

    Ok(())
}

async fn print_dashboard(client: &SupabaseClient, profile: &Profile) {
    match profile {
        Profile::Student(student) => {
            match DashboardService::student_overview(client, student.user_id).await {
                Ok(overview) => {
                    println!(
                        "📋 {} consultation(s), {} unread message(s), {} notification(s)",
                        overview.consultations.len(),
                        overview.unread_messages.len(),
                        overview.unread_notifications,
                    );
                }
                Err(e) => eprintln!("Failed to load dashboard: {e}"),
            }
        }
        Profile::Teacher(teacher) => {
            match DashboardService::teacher_overview(client, teacher.user_id).await {
                Ok(overview) => {
                    println!(
                        "📋 {} pending request(s), {} upcoming appointment(s), {} unread message(s), {} notification(s)",
                        overview.pending_requests.len(),
                        overview.upcoming_appointments.len(),
                        overview.unread_messages.len(),
                        overview.unread_notifications,
                    );
                }
                Err(e) => eprintln!("Failed to load dashboard: {e}"),
            }
        }
    }
}
