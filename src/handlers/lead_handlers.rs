use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::models::lead_models;
use crate::utils::mailer::LeadEmail;
use crate::AppState;

/// POST /api/lead
///
/// Validates a contact-form submission, drops honeypot hits without a trace,
/// and relays the rest to the operator inbox. The success body is identical
/// for the sent and silently-dropped cases so bots get no signal.
pub async fn submit_lead(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    // A body that isn't JSON gets the same treatment as an empty submission:
    // field-level "required" errors rather than a 422 from the framework.
    let payload: Value = serde_json::from_str(&body).unwrap_or_else(|_| json!({}));

    let lead = match lead_models::validate(&payload) {
        Ok(lead) => lead,
        Err(errors) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({"ok": false, "errors": errors})),
            ));
        }
    };

    if lead.is_honeypot_hit() {
        tracing::info!("honeypot field populated, dropping lead silently");
        return Ok(Json(json!({"ok": true})));
    }

    let settings = match state.mail_config.resolve() {
        Ok(settings) => settings,
        Err(missing) => {
            tracing::error!("lead mail config incomplete, missing {:?}", missing);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"ok": false, "error": "ENV_MISSING", "missing": missing})),
            ));
        }
    };

    let referrer = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok());
    let email = LeadEmail::build(&lead, &settings, referrer);

    match state.mailer.send_lead(&settings, email).await {
        Ok(()) => Ok(Json(json!({"ok": true}))),
        Err(e) => {
            tracing::error!("lead mail send failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"ok": false, "error": "MAIL_ERROR", "detail": e.to_string()})),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::mail::{MailConfig, SmtpSettings};
    use crate::utils::mailer::{Mailer, MailerError};
    use futures::future::BoxFuture;
    use std::sync::Mutex;

    /// Stands in for the SMTP transport: records every email it is handed,
    /// or fails every send when constructed with `failing()`.
    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<LeadEmail>>,
        failing: bool,
    }

    impl RecordingMailer {
        fn failing() -> Self {
            RecordingMailer {
                sent: Mutex::new(Vec::new()),
                failing: true,
            }
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl Mailer for RecordingMailer {
        fn send_lead<'a>(
            &'a self,
            _settings: &'a SmtpSettings,
            email: LeadEmail,
        ) -> BoxFuture<'a, Result<(), MailerError>> {
            Box::pin(async move {
                if self.failing {
                    // Any MailerError will do to exercise the MAIL_ERROR path.
                    return Err(MailerError::Address(
                        "not a mailbox".parse::<lettre::Address>().unwrap_err(),
                    ));
                }
                self.sent.lock().unwrap().push(email);
                Ok(())
            })
        }
    }

    fn mail_config() -> MailConfig {
        MailConfig {
            host: Some("smtp.example.com".into()),
            port: 587,
            secure: None,
            user: Some("leads@example.com".into()),
            pass: Some("hunter2".into()),
            lead_to: Some("owner@example.com".into()),
            lead_from: None,
        }
    }

    fn state_with(
        config: MailConfig,
        mailer: Arc<RecordingMailer>,
    ) -> State<Arc<AppState>> {
        State(Arc::new(AppState {
            mail_config: config,
            mailer,
        }))
    }

    fn valid_body() -> String {
        json!({
            "name": "Jo",
            "email": "a@b.com",
            "message": "1234567890",
        })
        .to_string()
    }

    #[tokio::test]
    async fn valid_submission_sends_exactly_one_email() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = state_with(mail_config(), mailer.clone());

        let result = submit_lead(state, HeaderMap::new(), valid_body()).await;

        assert_eq!(result.unwrap().0, json!({"ok": true}));
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("Jo"));
        assert_eq!(sent[0].to, "owner@example.com");
        // LEAD_FROM unset, falls back to the account
        assert_eq!(sent[0].from, "leads@example.com");
    }

    #[tokio::test]
    async fn referrer_header_flows_into_the_email() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = state_with(mail_config(), mailer.clone());
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, "https://aircoding.dev/".parse().unwrap());

        submit_lead(state, headers, valid_body()).await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert!(sent[0].text.contains("Origen: https://aircoding.dev/"));
    }

    #[tokio::test]
    async fn invalid_name_is_a_400_and_sends_nothing() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = state_with(mail_config(), mailer.clone());
        let body = json!({
            "name": "J",
            "email": "a@b.com",
            "message": "1234567890",
        })
        .to_string();

        let (status, Json(body)) = submit_lead(state, HeaderMap::new(), body)
            .await
            .unwrap_err();

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], json!(false));
        assert!(body["errors"]["name"].is_array());
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_a_400_not_a_crash() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = state_with(mail_config(), mailer.clone());

        let (status, Json(body)) =
            submit_lead(state, HeaderMap::new(), "{not json".to_string())
                .await
                .unwrap_err();

        assert_eq!(status, StatusCode::BAD_REQUEST);
        for field in ["name", "email", "message"] {
            assert_eq!(body["errors"][field], json!(["required"]));
        }
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn honeypot_hit_reports_success_but_sends_nothing() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = state_with(mail_config(), mailer.clone());
        let body = json!({
            "name": "Jo",
            "email": "a@b.com",
            "message": "1234567890",
            "website": "http://spam.test",
        })
        .to_string();

        let result = submit_lead(state, HeaderMap::new(), body).await;

        assert_eq!(result.unwrap().0, json!({"ok": true}));
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn missing_config_is_reported_without_a_send_attempt() {
        let mailer = Arc::new(RecordingMailer::default());
        let config = MailConfig {
            host: None,
            pass: None,
            ..mail_config()
        };
        let state = state_with(config, mailer.clone());

        let (status, Json(body)) = submit_lead(state, HeaderMap::new(), valid_body())
            .await
            .unwrap_err();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["ok"], json!(false));
        assert_eq!(body["error"], json!("ENV_MISSING"));
        assert_eq!(body["missing"], json!(["SMTP_HOST", "SMTP_PASS"]));
        assert_eq!(mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn transport_failure_is_a_sanitized_mail_error() {
        let mailer = Arc::new(RecordingMailer::failing());
        let state = state_with(mail_config(), mailer.clone());

        let (status, Json(body)) = submit_lead(state, HeaderMap::new(), valid_body())
            .await
            .unwrap_err();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("MAIL_ERROR"));
        assert!(!body["detail"].as_str().unwrap().is_empty());
        // the configured password never reaches the response
        assert!(!body.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn resubmission_sends_again() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = state_with(mail_config(), mailer.clone());

        submit_lead(state.clone(), HeaderMap::new(), valid_body())
            .await
            .unwrap();
        submit_lead(state, HeaderMap::new(), valid_body())
            .await
            .unwrap();

        assert_eq!(mailer.sent_count(), 2);
    }
}
