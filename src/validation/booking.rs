use garde::Validate;
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    models::booking::Attendee,
};

const PHONE_MIN: usize = 7;
const PHONE_MAX: usize = 20;

/// A booking submission as posted by the front end.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookingRequest {
    #[garde(skip)]
    pub session_id: i64,
    #[garde(custom(not_blank), length(chars, max = 80))]
    #[serde(default)]
    pub full_name: String,
    #[garde(custom(phone_format))]
    #[serde(default)]
    pub phone: String,
    #[garde(email, length(chars, max = 120))]
    #[serde(default)]
    pub email: String,
    #[garde(custom(consent_given))]
    #[serde(default)]
    pub consent: bool,
}

fn not_blank(value: &str, _: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("must not be empty"));
    }
    Ok(())
}

fn phone_format(value: &str, _: &()) -> garde::Result {
    let len = value.chars().count();
    if !(PHONE_MIN..=PHONE_MAX).contains(&len) {
        return Err(garde::Error::new(format!(
            "must be between {PHONE_MIN} and {PHONE_MAX} characters"
        )));
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '(' | ')' | ' ' | '-'))
    {
        return Err(garde::Error::new(
            "may only contain digits, spaces, '+', '-', '(' and ')'",
        ));
    }

    Ok(())
}

fn consent_given(value: &bool, _: &()) -> garde::Result {
    if !*value {
        return Err(garde::Error::new("data-use consent is required"));
    }
    Ok(())
}

impl BookingRequest {
    /// Trims every field and lower-cases the email.
    pub fn normalized(self) -> Self {
        Self {
            session_id: self.session_id,
            full_name: self.full_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            consent: self.consent,
        }
    }

    /// Normalizes the request and checks every field.
    ///
    /// # Returns
    ///
    /// A `Result` containing the session id and the `Attendee` to book.
    pub fn into_attendee(self) -> Result<(i64, Attendee)> {
        let request = self.normalized();
        request
            .validate()
            .map_err(|report| AppError::Validation(report.to_string()))?;

        Ok((
            request.session_id,
            Attendee {
                full_name: request.full_name,
                phone: request.phone,
                email: request.email,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BookingRequest {
        BookingRequest {
            session_id: 7,
            full_name: "  Ana Ruiz ".to_string(),
            phone: " +34 (600) 123-456 ".to_string(),
            email: " Ana.Ruiz@Example.COM ".to_string(),
            consent: true,
        }
    }

    fn rejects(request: BookingRequest, field: &str) {
        match request.into_attendee() {
            Err(AppError::Validation(msg)) => {
                assert!(msg.contains(field), "{msg:?} does not mention {field}")
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn normalizes_valid_request() {
        let (session_id, attendee) = request().into_attendee().unwrap();

        assert_eq!(session_id, 7);
        assert_eq!(attendee.full_name, "Ana Ruiz");
        assert_eq!(attendee.phone, "+34 (600) 123-456");
        assert_eq!(attendee.email, "ana.ruiz@example.com");
    }

    #[test]
    fn blank_name_is_rejected() {
        rejects(BookingRequest { full_name: "   ".to_string(), ..request() }, "full_name");
    }

    #[test]
    fn long_name_is_rejected() {
        rejects(BookingRequest { full_name: "a".repeat(81), ..request() }, "full_name");
        assert!(BookingRequest { full_name: "é".repeat(80), ..request() }
            .into_attendee()
            .is_ok());
    }

    #[test]
    fn phone_rules() {
        rejects(BookingRequest { phone: "12345".to_string(), ..request() }, "phone");
        rejects(BookingRequest { phone: "600-abc-123".to_string(), ..request() }, "phone");
        rejects(BookingRequest { phone: "1".repeat(21), ..request() }, "phone");
        assert!(BookingRequest { phone: "6001234".to_string(), ..request() }
            .into_attendee()
            .is_ok());
    }

    #[test]
    fn email_rules() {
        rejects(BookingRequest { email: "not-an-email".to_string(), ..request() }, "email");
        let long = format!("{}@example.com", "a".repeat(110));
        rejects(BookingRequest { email: long, ..request() }, "email");
    }

    #[test]
    fn consent_is_required() {
        rejects(BookingRequest { consent: false, ..request() }, "consent");
    }

    #[test]
    fn missing_text_field_fails_validation() {
        let request: BookingRequest = serde_json::from_str(
            r#"{"session_id":1,"full_name":"Ana","email":"a@b.co","consent":true}"#,
        )
        .unwrap();
        assert_eq!(request.phone, "");
        rejects(request, "phone");
    }

    #[test]
    fn missing_consent_defaults_to_false() {
        let request: BookingRequest = serde_json::from_str(
            r#"{"session_id":1,"full_name":"Ana","phone":"600123456","email":"a@b.co"}"#,
        )
        .unwrap();
        assert!(!request.consent);
    }
}
