use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

use crate::config::mail::SmtpSettings;
use crate::models::lead_models::LeadSubmission;

// Upper bound on the whole connect/greet/send sequence so a dead relay
// cannot stall the request.
const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("invalid mailbox address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// The notification email for one lead, rendered and ready to relay.
/// Built per request, sent once, dropped.
#[derive(Clone, Debug)]
pub struct LeadEmail {
    pub from: String,
    pub to: String,
    pub reply_to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl LeadEmail {
    /// Renders the operator notification from a validated submission plus
    /// request metadata (referrer header, current time).
    pub fn build(lead: &LeadSubmission, settings: &SmtpSettings, referrer: Option<&str>) -> Self {
        let service = lead.service.map(|s| s.as_str());
        let subject = format!(
            "Nuevo lead — {} ({})",
            lead.name,
            service.unwrap_or("general")
        );
        let origin = referrer.unwrap_or("");
        let date = Utc::now().to_rfc3339();

        let text = format!(
            "Nombre: {}\nEmail: {}\nServicio: {}\n\nMensaje:\n{}\n\nOrigen: {}\nFecha: {}",
            lead.name,
            lead.email,
            service.unwrap_or("No especificado"),
            lead.message,
            origin,
            date,
        );

        let html = format!(
            concat!(
                r#"<table style="width:100%;max-width:640px;margin:auto;font-family:Inter,system-ui,sans-serif;border-collapse:collapse">"#,
                r#"<tr><td style="padding:16px 0"><h2 style="margin:0 0 6px">Nuevo lead</h2>"#,
                r#"<div style="font-size:14px;color:#64748b">Servicio: <b>{service}</b></div></td></tr>"#,
                r#"<tr><td style="padding:12px;background:#f8fafc;border:1px solid #e2e8f0;border-radius:12px">"#,
                r#"<p style="margin:0 0 8px"><b>Nombre:</b> {name}</p>"#,
                r#"<p style="margin:0 0 8px"><b>Email:</b> <a href="mailto:{email}">{email}</a></p>"#,
                r#"<p style="margin:0;white-space:pre-wrap"><b>Mensaje:</b> {message}</p></td></tr>"#,
                r#"<tr><td style="padding:10px 0;color:#64748b;font-size:12px">Origen: {origin} • Fecha: {date}</td></tr>"#,
                r#"</table>"#,
            ),
            service = escape_html(service.unwrap_or("No especificado")),
            name = escape_html(&lead.name),
            email = escape_html(&lead.email),
            message = escape_html(&lead.message),
            origin = escape_html(origin),
            date = date,
        );

        LeadEmail {
            from: settings.lead_from.clone(),
            to: settings.lead_to.clone(),
            reply_to: lead.email.clone(),
            subject,
            text,
            html,
        }
    }

    fn into_message(self) -> Result<Message, MailerError> {
        Ok(Message::builder()
            .from(self.from.parse::<Mailbox>()?)
            .to(self.to.parse::<Mailbox>()?)
            .reply_to(self.reply_to.parse::<Mailbox>()?)
            .subject(self.subject)
            .multipart(MultiPart::alternative_plain_html(self.text, self.html))?)
    }
}

/// Outbound mail seam. Object-safe so the lead handler can run against a
/// recording fake in tests.
pub trait Mailer: Send + Sync {
    fn send_lead<'a>(
        &'a self,
        settings: &'a SmtpSettings,
        email: LeadEmail,
    ) -> BoxFuture<'a, Result<(), MailerError>>;
}

/// Relays lead notifications over SMTP. Each send builds its own transport
/// from the resolved settings and drops it afterwards; there is no pooling
/// or shared state between requests.
pub struct SmtpMailer;

impl Mailer for SmtpMailer {
    fn send_lead<'a>(
        &'a self,
        settings: &'a SmtpSettings,
        email: LeadEmail,
    ) -> BoxFuture<'a, Result<(), MailerError>> {
        Box::pin(async move {
            let message = email.into_message()?;
            let transport = build_transport(settings)?;
            let response = transport.send(message).await?;
            tracing::info!("lead mail relayed, smtp code {}", response.code());
            Ok(())
        })
    }
}

fn build_transport(
    settings: &SmtpSettings,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailerError> {
    // 465-style implicit TLS wraps the connection from the first byte;
    // otherwise the session must upgrade via STARTTLS before auth.
    let builder = if settings.secure {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
    };
    Ok(builder
        .port(settings.port)
        .credentials(Credentials::new(
            settings.user.clone(),
            settings.pass.clone(),
        ))
        .timeout(Some(SMTP_TIMEOUT))
        .build())
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
