use dotenvy::dotenv;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{TraceLayer, DefaultMakeSpan, DefaultOnResponse};
use tracing::Level;
use std::sync::Arc;

mod handlers {
    pub mod lead_handlers;
}
mod config {
    pub mod mail;
}
mod models {
    pub mod lead_models;
}
mod utils {
    pub mod mailer;
}

use config::mail::MailConfig;
use handlers::lead_handlers;
use utils::mailer::{Mailer, SmtpMailer};

async fn health_check() -> &'static str {
    "OK"
}

pub struct AppState {
    mail_config: MailConfig,
    mailer: Arc<dyn Mailer>,
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    // Read once at startup; a missing SMTP key is reported per request on
    // the lead route, not treated as fatal here.
    let mail_config = MailConfig::from_env();
    if let Err(missing) = mail_config.resolve() {
        tracing::warn!("mail config incomplete, lead relay disabled: {:?}", missing);
    }

    let state = Arc::new(AppState {
        mail_config,
        mailer: Arc::new(SmtpMailer),
    });

    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/lead", post(lead_handlers::submit_lead))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
        )
        .layer(
            CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_origin(Any) // Be cautious with `Any` in production; restrict to your frontend origin
                .allow_headers([axum::http::header::CONTENT_TYPE])
        )
        .with_state(state);

    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    axum::serve(listener, app.into_make_service()).await.unwrap();
}
