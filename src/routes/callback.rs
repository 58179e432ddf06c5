use actix_web::{get, web, HttpRequest, HttpResponse};
use tokio::sync::mpsc::UnboundedSender;

/// Canal vers le flux de sign-in en attente du callback OAuth.
/// C'est l'équivalent local du handler de deep link de l'app mobile.
#[derive(Clone)]
pub struct CallbackChannel {
    pub tx: UnboundedSender<String>,
    pub redirect_url: String,
}

const CLOSE_PAGE: &str = "<!doctype html><html><body>\
<p>Sign-in complete. You can close this window and return to NEXAD.</p>\
</body></html>";

/// Les tokens livrés en fragment (#access_token=...) n'atteignent jamais le
/// serveur: cette page les réémet en query string et recharge.
const FRAGMENT_FORWARD_PAGE: &str = "<!doctype html><html><body><script>\
var h = window.location.hash;\
if (h && h.length > 1) {\
  window.location.replace(window.location.pathname + '?' + h.substring(1));\
} else {\
  document.body.textContent = 'Sign-in callback received no credentials.';\
}\
</script></body></html>";

#[get("/callback")]
pub async fn auth_callback(
    req: HttpRequest,
    channel: web::Data<CallbackChannel>,
) -> HttpResponse {
    let query = req.query_string();
    let has_payload = ["access_token", "refresh_token", "error", "error_code"]
        .iter()
        .any(|key| {
            query
                .split('&')
                .any(|pair| pair.strip_prefix(*key).is_some_and(|rest| rest.starts_with('=')))
        });

    if has_payload {
        let callback_url = format!("{}?{}", channel.redirect_url, query);
        if channel.tx.send(callback_url).is_err() {
            log::warn!("auth callback received but no sign-in flow is waiting");
        }
        HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(CLOSE_PAGE)
    } else {
        HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(FRAGMENT_FORWARD_PAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use tokio::sync::mpsc;

    fn channel() -> (CallbackChannel, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            CallbackChannel {
                tx,
                redirect_url: "http://127.0.0.1:8765/auth/callback".to_string(),
            },
            rx,
        )
    }

    #[actix_web::test]
    async fn test_callback_with_tokens_forwards_full_url() {
        let (channel, mut rx) = channel();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(channel))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/auth/callback?access_token=aaa&refresh_token=rrr")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        let forwarded = rx.try_recv().unwrap();
        assert_eq!(
            forwarded,
            "http://127.0.0.1:8765/auth/callback?access_token=aaa&refresh_token=rrr"
        );
    }

    #[actix_web::test]
    async fn test_callback_without_params_serves_fragment_forward_page() {
        let (channel, mut rx) = channel();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(channel))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/auth/callback").to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        let body = test::read_body(resp).await;
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("location.replace"));
        assert!(rx.try_recv().is_err());
    }

    #[actix_web::test]
    async fn test_callback_with_error_param_still_forwards() {
        let (channel, mut rx) = channel();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(channel))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/auth/callback?error=access_denied")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        assert!(rx.try_recv().unwrap().contains("error=access_denied"));
    }
}
