// Session navigateur pour le handoff OAuth

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::routes;
use crate::routes::callback::CallbackChannel;

/// Issue du passage par le navigateur: `Success` porte l'URL de callback,
/// `Cancel` est un refus explicite de l'utilisateur, `Dismiss` une
/// fermeture sans réponse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrowserResult {
    Success { callback_url: String },
    Cancel,
    Dismiss,
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn authenticate(&self, authorize_url: &str, redirect_url: &str) -> BrowserResult;
}

/// Implémentation système: démarre le listener de callback sur la boucle
/// locale, laisse l'utilisateur ouvrir l'URL d'autorisation dans son
/// navigateur, et attend le retour.
pub struct SystemBrowser {
    port: u16,
    wait: Duration,
}

impl SystemBrowser {
    pub fn new(port: u16) -> Self {
        SystemBrowser {
            port,
            wait: Duration::from_secs(180),
        }
    }
}

#[async_trait]
impl BrowserSession for SystemBrowser {
    async fn authenticate(&self, authorize_url: &str, redirect_url: &str) -> BrowserResult {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = CallbackChannel {
            tx,
            redirect_url: redirect_url.to_string(),
        };

        let server = {
            let channel = channel.clone();
            actix_web::HttpServer::new(move || {
                actix_web::App::new()
                    .app_data(actix_web::web::Data::new(channel.clone()))
                    .configure(routes::configure_routes)
            })
            .workers(1)
            .disable_signals()
            .bind(("127.0.0.1", self.port))
        };
        let server = match server {
            Ok(server) => server.run(),
            Err(e) => {
                log::error!("failed to bind the callback listener on port {}: {e}", self.port);
                return BrowserResult::Dismiss;
            }
        };
        let handle = server.handle();
        tokio::spawn(server);

        println!("🔵 Open this URL in your browser to sign in:");
        println!("{authorize_url}");

        let received = tokio::time::timeout(self.wait, rx.recv()).await;
        handle.stop(false).await;

        match received {
            Ok(Some(callback_url)) => BrowserResult::Success { callback_url },
            _ => BrowserResult::Dismiss,
        }
    }
}
