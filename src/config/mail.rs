use std::env;

/// Default submission port. 465 switches to implicit TLS; see
/// [`MailConfig::resolve`].
const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP configuration as read from the environment at startup. The three
/// required keys stay optional here so a missing one surfaces as an
/// `ENV_MISSING` response on the lead route instead of a startup panic.
#[derive(Clone, Debug)]
pub struct MailConfig {
    pub host: Option<String>,
    pub port: u16,
    pub secure: Option<bool>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub lead_to: Option<String>,
    pub lead_from: Option<String>,
}

/// Fully resolved transport settings, produced from a [`MailConfig`] that has
/// all required keys present.
#[derive(Clone, Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    /// Implicit TLS from the first byte; otherwise mandatory STARTTLS.
    pub secure: bool,
    pub user: String,
    pub pass: String,
    pub lead_to: String,
    pub lead_from: String,
}

impl MailConfig {
    /// Reads the environment once. Call after `dotenv()` in `main`; nothing
    /// else in the crate touches `std::env`.
    pub fn from_env() -> Self {
        let port = env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_SMTP_PORT);
        let secure = env::var("SMTP_SECURE").ok().and_then(|s| parse_bool(&s));

        MailConfig {
            host: env::var("SMTP_HOST").ok(),
            port,
            secure,
            user: env::var("SMTP_USER").ok(),
            pass: env::var("SMTP_PASS").ok(),
            lead_to: env::var("LEAD_TO").ok(),
            lead_from: env::var("LEAD_FROM").ok(),
        }
    }

    /// Resolves to concrete transport settings, or the list of missing
    /// required keys for the `ENV_MISSING` response.
    pub fn resolve(&self) -> Result<SmtpSettings, Vec<&'static str>> {
        let mut missing = Vec::new();
        if self.host.is_none() {
            missing.push("SMTP_HOST");
        }
        if self.user.is_none() {
            missing.push("SMTP_USER");
        }
        if self.pass.is_none() {
            missing.push("SMTP_PASS");
        }
        if !missing.is_empty() {
            return Err(missing);
        }

        let host = self.host.clone().unwrap_or_default();
        let user = self.user.clone().unwrap_or_default();
        let pass = self.pass.clone().unwrap_or_default();
        // Historically this service ran both on 465 and 587; the port keeps
        // implying the security mode unless SMTP_SECURE overrides it.
        let secure = self.secure.unwrap_or(self.port == 465);

        Ok(SmtpSettings {
            lead_to: self.lead_to.clone().unwrap_or_else(|| user.clone()),
            lead_from: self.lead_from.clone().unwrap_or_else(|| user.clone()),
            host,
            port: self.port,
            secure,
            user,
            pass,
        })
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
