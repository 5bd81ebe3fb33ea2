//! Consultation Form Rules

use once_cell::sync::Lazy;
use regex::Regex;

pub const INVALID_EMAIL: &str = "Please enter a valid email address";
pub const MESSAGE_TOO_SHORT: &str = "Please provide more details (at least 10 characters)";
pub const SUBMITTED: &str = "Consultation request submitted! We'll contact you within 24 hours.";

/// Shortest accepted message, counted after trimming
pub const MIN_MESSAGE_CHARS: usize = 10;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex pattern should be valid")
});

/// Per-field errors of a consultation request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsultationErrors {
    pub email: Option<&'static str>,
    pub message: Option<&'static str>,
}

impl ConsultationErrors {
    pub const fn is_valid(&self) -> bool {
        self.email.is_none() && self.message.is_none()
    }
}

/// Check both fields; every failing field gets its own message
pub fn validate_consultation(email: &str, message: &str) -> ConsultationErrors {
    ConsultationErrors {
        email: (!EMAIL_REGEX.is_match(email)).then_some(INVALID_EMAIL),
        message: (message.trim().chars().count() < MIN_MESSAGE_CHARS).then_some(MESSAGE_TOO_SHORT),
    }
}
