// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Contact form validator.
//!
//! Each field runs a fixed chain of rules over its trimmed value. Every rule
//! in a chain is evaluated, so one field can report several problems and the
//! client gets the complete list in a single round trip. Fields are checked
//! independently of each other.

use email_address::EmailAddress;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

pub const NAME_REQUIRED: &str = "Vārds ir obligāts / Name is required";
pub const NAME_TOO_SHORT: &str = "Vārdam jābūt vismaz 2 rakstzīmēm / Name must be at least 2 characters";
pub const NAME_TOO_LONG: &str = "Vārds ir pārāk garš / Name is too long";
pub const NAME_INVALID: &str = "Vārds drīkst saturēt tikai burtus / Name can only contain letters";
pub const EMAIL_REQUIRED: &str = "E-pasts ir obligāts / Email is required";
pub const EMAIL_INVALID: &str = "Nederīga e-pasta adrese / Invalid email address";
pub const EMAIL_TOO_LONG: &str = "E-pasts ir pārāk garš / Email is too long";
pub const PHONE_REQUIRED: &str = "Telefons ir obligāts / Phone is required";
pub const PHONE_INVALID: &str = "Nederīgs telefona numurs / Invalid phone number";
pub const MESSAGE_REQUIRED: &str = "Ziņa ir obligāta / Message is required";
pub const MESSAGE_TOO_SHORT: &str =
    "Ziņai jābūt vismaz 10 rakstzīmēm / Message must be at least 10 characters";
pub const MESSAGE_TOO_LONG: &str =
    "Ziņa ir pārāk gara (maks. 2000 rakstzīmes) / Message is too long (max 2000 characters)";

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 100;
const EMAIL_MAX: usize = 255;
const MESSAGE_MIN: usize = 10;
const MESSAGE_MAX: usize = 2000;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-ZāčēģīķļņšūžĀČĒĢĪĶĻŅŠŪŽ\s-]+$").expect("name pattern is valid")
    })
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[+]?[0-9\s()-]{8,20}$").expect("phone pattern is valid"))
}

/// Raw form fields as received. Values are untyped until validated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSubmission {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub email: Option<Value>,
    #[serde(default)]
    pub phone: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
}

/// A validated, normalized contact form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

/// One rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Result of validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// All rules passed
    Valid(ContactSubmission),
    /// At least one rule failed, in field then rule order
    Invalid(Vec<FieldError>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }

    pub fn errors(&self) -> &[FieldError] {
        match self {
            ValidationResult::Valid(_) => &[],
            ValidationResult::Invalid(errors) => errors,
        }
    }
}

/// Contact form validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactValidator;

impl ContactValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a complete submission.
    pub fn validate(&self, raw: &RawSubmission) -> ValidationResult {
        let mut errors = Vec::new();

        let name = text_of(raw.name.as_ref());
        self.check_name(&name, &mut errors);

        let email = text_of(raw.email.as_ref());
        let email = self.check_email(&email, &mut errors);

        let phone = text_of(raw.phone.as_ref());
        self.check_phone(&phone, &mut errors);

        let message = text_of(raw.message.as_ref());
        self.check_message(&message, &mut errors);

        if errors.is_empty() {
            ValidationResult::Valid(ContactSubmission {
                name,
                email,
                phone,
                message,
            })
        } else {
            debug!(
                fields = ?errors.iter().map(|e| e.field).collect::<Vec<_>>(),
                "Contact submission rejected"
            );
            ValidationResult::Invalid(errors)
        }
    }

    fn check_name(&self, name: &str, errors: &mut Vec<FieldError>) {
        let len = name.chars().count();
        let field = "name";

        if name.is_empty() {
            errors.push(FieldError { field, message: NAME_REQUIRED });
        }
        if len < NAME_MIN {
            errors.push(FieldError { field, message: NAME_TOO_SHORT });
        }
        if len > NAME_MAX {
            errors.push(FieldError { field, message: NAME_TOO_LONG });
        }
        if !name_pattern().is_match(name) {
            errors.push(FieldError { field, message: NAME_INVALID });
        }
    }

    /// Returns the normalized address, or the trimmed input if it is not an
    /// address at all.
    fn check_email(&self, email: &str, errors: &mut Vec<FieldError>) -> String {
        let field = "email";

        if email.is_empty() {
            errors.push(FieldError { field, message: EMAIL_REQUIRED });
        }

        let normalized = if is_email(email) {
            normalize_email(email)
        } else {
            errors.push(FieldError { field, message: EMAIL_INVALID });
            email.to_string()
        };

        if normalized.chars().count() > EMAIL_MAX {
            errors.push(FieldError { field, message: EMAIL_TOO_LONG });
        }

        normalized
    }

    fn check_phone(&self, phone: &str, errors: &mut Vec<FieldError>) {
        let field = "phone";

        if phone.is_empty() {
            errors.push(FieldError { field, message: PHONE_REQUIRED });
        }
        if !phone_pattern().is_match(phone) {
            errors.push(FieldError { field, message: PHONE_INVALID });
        }
    }

    fn check_message(&self, message: &str, errors: &mut Vec<FieldError>) {
        let len = message.chars().count();
        let field = "message";

        if message.is_empty() {
            errors.push(FieldError { field, message: MESSAGE_REQUIRED });
        }
        if len < MESSAGE_MIN {
            errors.push(FieldError { field, message: MESSAGE_TOO_SHORT });
        }
        if len > MESSAGE_MAX {
            errors.push(FieldError { field, message: MESSAGE_TOO_LONG });
        }
    }
}

/// Coerce an untyped field to trimmed text. Absent, null and structured
/// values become empty.
fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Syntactic address check. The domain must contain a dot and every label
/// must be non-empty, so `user@localhost` is rejected.
fn is_email(candidate: &str) -> bool {
    if !EmailAddress::is_valid(candidate) {
        return false;
    }

    match candidate.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && domain.split('.').all(|label| !label.is_empty())
                && domain
                    .rsplit('.')
                    .next()
                    .map(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_alphabetic()))
                    .unwrap_or(false)
        }
        None => false,
    }
}

const GMAIL_DOMAINS: &[&str] = &["gmail.com", "googlemail.com"];
const OUTLOOK_DOMAINS: &[&str] = &["outlook.com", "hotmail.com", "live.com"];
const ICLOUD_DOMAINS: &[&str] = &["icloud.com", "me.com", "mac.com"];
const YAHOO_DOMAINS: &[&str] = &["yahoo.com", "ymail.com", "rocketmail.com"];

/// Canonical form of an address: lowercase, with provider-specific
/// sub-addressing removed.
pub fn normalize_email(email: &str) -> String {
    let lowered = email.trim().to_lowercase();
    let Some((local, domain)) = lowered.rsplit_once('@') else {
        return lowered;
    };

    let (local, domain) = if GMAIL_DOMAINS.contains(&domain) {
        let base = local.split('+').next().unwrap_or(local).replace('.', "");
        (base, "gmail.com")
    } else if OUTLOOK_DOMAINS.contains(&domain) || ICLOUD_DOMAINS.contains(&domain) {
        (local.split('+').next().unwrap_or(local).to_string(), domain)
    } else if YAHOO_DOMAINS.contains(&domain) {
        (local.split('-').next().unwrap_or(local).to_string(), domain)
    } else {
        (local.to_string(), domain)
    };

    if local.is_empty() {
        return lowered;
    }

    format!("{}@{}", local, domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawSubmission {
        serde_json::from_value(value).unwrap()
    }

    fn valid_raw() -> RawSubmission {
        raw(json!({
            "name": "Jānis Bērziņš",
            "email": "janis@example.com",
            "phone": "+371 20123456",
            "message": "Lūdzu, sazinieties ar mani par jūsu pakalpojumiem."
        }))
    }

    fn errors_for<'a>(result: &'a ValidationResult, field: &str) -> Vec<&'a str> {
        result
            .errors()
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.message)
            .collect()
    }

    #[test]
    fn test_latvian_submission_is_valid() {
        let result = ContactValidator::new().validate(&valid_raw());

        match result {
            ValidationResult::Valid(submission) => {
                assert_eq!(submission.name, "Jānis Bērziņš");
                assert_eq!(submission.email, "janis@example.com");
                assert_eq!(submission.phone, "+371 20123456");
            }
            ValidationResult::Invalid(errors) => panic!("unexpected errors: {:?}", errors),
        }
    }

    #[test]
    fn test_fields_are_trimmed() {
        let result = ContactValidator::new().validate(&raw(json!({
            "name": "  Anna Kalniņa ",
            "email": "  Anna@Example.LV ",
            "phone": " 20123456  ",
            "message": "\n Vēlos pasūtīt jumta remontu. \n"
        })));

        match result {
            ValidationResult::Valid(submission) => {
                assert_eq!(submission.name, "Anna Kalniņa");
                assert_eq!(submission.email, "anna@example.lv");
                assert_eq!(submission.phone, "20123456");
                assert_eq!(submission.message, "Vēlos pasūtīt jumta remontu.");
            }
            ValidationResult::Invalid(errors) => panic!("unexpected errors: {:?}", errors),
        }
    }

    #[test]
    fn test_missing_message_reported() {
        let mut submission = valid_raw();
        submission.message = None;

        let result = ContactValidator::new().validate(&submission);
        assert!(!result.is_valid());
        assert_eq!(
            errors_for(&result, "message"),
            vec![MESSAGE_REQUIRED, MESSAGE_TOO_SHORT]
        );
        assert!(errors_for(&result, "name").is_empty());
    }

    #[test]
    fn test_empty_name_collects_every_violation() {
        let mut submission = valid_raw();
        submission.name = Some(json!("   "));

        let result = ContactValidator::new().validate(&submission);
        assert_eq!(
            errors_for(&result, "name"),
            vec![NAME_REQUIRED, NAME_TOO_SHORT, NAME_INVALID]
        );
    }

    #[test]
    fn test_name_rules() {
        let validator = ContactValidator::new();

        let mut submission = valid_raw();
        submission.name = Some(json!("Anna-Marija Ozoliņa"));
        assert!(validator.validate(&submission).is_valid());

        submission.name = Some(json!("R2D2"));
        assert_eq!(
            errors_for(&validator.validate(&submission), "name"),
            vec![NAME_INVALID]
        );

        submission.name = Some(json!("a".repeat(101)));
        assert_eq!(
            errors_for(&validator.validate(&submission), "name"),
            vec![NAME_TOO_LONG]
        );
    }

    #[test]
    fn test_email_rules() {
        let validator = ContactValidator::new();
        let mut submission = valid_raw();

        for bad in ["not-an-email", "user@localhost", "@example.com", "user@example."] {
            submission.email = Some(json!(bad));
            assert_eq!(
                errors_for(&validator.validate(&submission), "email"),
                vec![EMAIL_INVALID],
                "{} should be rejected",
                bad
            );
        }

        submission.email = Some(json!(format!("{}@example.com", "a".repeat(250))));
        assert!(errors_for(&validator.validate(&submission), "email").contains(&EMAIL_TOO_LONG));
    }

    #[test]
    fn test_phone_rules() {
        let validator = ContactValidator::new();
        let mut submission = valid_raw();

        for good in ["+371 20123456", "(371) 2012-3456", "20123456"] {
            submission.phone = Some(json!(good));
            assert!(validator.validate(&submission).is_valid(), "{} should pass", good);
        }

        for bad in ["1234567", "+371 2012abcd", "++37120123456", "123456789012345678901"] {
            submission.phone = Some(json!(bad));
            assert_eq!(
                errors_for(&validator.validate(&submission), "phone"),
                vec![PHONE_INVALID],
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_message_length_counts_characters() {
        let validator = ContactValidator::new();
        let mut submission = valid_raw();

        // Ten characters, more than ten bytes
        submission.message = Some(json!("ļļļļļļļļļļ"));
        assert!(validator.validate(&submission).is_valid());

        submission.message = Some(json!("ā".repeat(2001)));
        assert_eq!(
            errors_for(&validator.validate(&submission), "message"),
            vec![MESSAGE_TOO_LONG]
        );
    }

    #[test]
    fn test_non_string_values_are_coerced() {
        let validator = ContactValidator::new();
        let mut submission = valid_raw();

        submission.phone = Some(json!(37120123456u64));
        assert!(validator.validate(&submission).is_valid());

        submission.name = Some(json!({"first": "Jānis"}));
        assert!(errors_for(&validator.validate(&submission), "name").contains(&NAME_REQUIRED));
    }

    #[test]
    fn test_errors_are_ordered_by_field() {
        let result = ContactValidator::new().validate(&RawSubmission::default());
        let fields: Vec<&str> = result.errors().iter().map(|e| e.field).collect();

        let first_email = fields.iter().position(|f| *f == "email").unwrap();
        let last_name = fields.iter().rposition(|f| *f == "name").unwrap();
        assert!(last_name < first_email);
        assert_eq!(fields.last(), Some(&"message"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("Janis@Example.COM"), "janis@example.com");
        assert_eq!(normalize_email("j.a.nis+forms@googlemail.com"), "janis@gmail.com");
        assert_eq!(normalize_email("janis+work@outlook.com"), "janis@outlook.com");
        assert_eq!(normalize_email("janis-news@yahoo.com"), "janis@yahoo.com");
        assert_eq!(normalize_email("first.last+x@example.lv"), "first.last+x@example.lv");
    }
}
