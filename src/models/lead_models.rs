use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

lazy_static! {
    // Pragmatic format check, same strictness the site's client form applies.
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

/// Service the visitor is asking about. Wire values match the option values
/// of the contact form's select input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    WebMovil,
    Software,
    Ia,
    Apis,
}

impl Service {
    pub const ALL: [Service; 4] = [
        Service::WebMovil,
        Service::Software,
        Service::Ia,
        Service::Apis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::WebMovil => "webmovil",
            Service::Software => "software",
            Service::Ia => "ia",
            Service::Apis => "apis",
        }
    }

    fn parse(s: &str) -> Option<Service> {
        Service::ALL.iter().copied().find(|v| v.as_str() == s)
    }
}

/// A contact-form submission that passed validation. `website` is the
/// honeypot: the form never shows it, so any content means a bot filled it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LeadSubmission {
    pub name: String,
    pub email: String,
    pub service: Option<Service>,
    pub message: String,
    #[serde(default)]
    pub website: String,
}

impl LeadSubmission {
    pub fn is_honeypot_hit(&self) -> bool {
        !self.website.trim().is_empty()
    }
}

/// Per-field validation failures, keyed by field name. BTreeMap keeps the
/// serialized `errors` object deterministic.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

/// Validates an untrusted JSON payload field by field, accumulating every
/// failure instead of stopping at the first, so the client can mark all
/// offending inputs at once.
pub fn validate(payload: &Value) -> Result<LeadSubmission, FieldErrors> {
    let mut errors = FieldErrors::new();

    let name = require_string(payload, "name", &mut errors);
    if let Some(name) = &name {
        if name.chars().count() < 2 {
            push(&mut errors, "name", "must be at least 2 characters");
        }
    }

    let email = require_string(payload, "email", &mut errors);
    if let Some(email) = &email {
        if !EMAIL_RE.is_match(email) {
            push(&mut errors, "email", "must be a valid email address");
        }
    }

    let message = require_string(payload, "message", &mut errors);
    if let Some(message) = &message {
        if message.chars().count() < 10 {
            push(&mut errors, "message", "must be at least 10 characters");
        }
    }

    let service = match payload.get("service") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => match Service::parse(s) {
            Some(service) => Some(service),
            None => {
                push(
                    &mut errors,
                    "service",
                    "must be one of webmovil, software, ia, apis",
                );
                None
            }
        },
        Some(_) => {
            push(&mut errors, "service", "expected a string");
            None
        }
    };

    let website = match payload.get("website") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            push(&mut errors, "website", "expected a string");
            String::new()
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(LeadSubmission {
        name: name.unwrap_or_default(),
        email: email.unwrap_or_default(),
        service,
        message: message.unwrap_or_default(),
        website,
    })
}

fn require_string(payload: &Value, field: &'static str, errors: &mut FieldErrors) -> Option<String> {
    match payload.get(field) {
        None | Some(Value::Null) => {
            push(errors, field, "required");
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            push(errors, field, "expected a string");
            None
        }
    }
}

fn push(errors: &mut FieldErrors, field: &'static str, reason: &str) {
    errors.entry(field).or_default().push(reason.to_string());
}
