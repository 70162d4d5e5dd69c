use std::sync::LazyLock;

use regex::Regex;

use crate::models::{BookingError, ContactDetails};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern compiles")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?\d{7,15}$").expect("phone pattern compiles")
});

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 254;

/// Trim and check the patient's contact details.
pub fn validate_contact(contact: &ContactDetails) -> Result<ContactDetails, BookingError> {
    let name = contact.name.trim();
    if name.is_empty() {
        return Err(BookingError::InvalidContact("patient name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(BookingError::InvalidContact(format!(
            "patient name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }

    let email = contact.email.trim();
    if email.len() > MAX_EMAIL_LEN || !EMAIL.is_match(email) {
        return Err(BookingError::InvalidContact(format!("'{}' is not a valid email address", email)));
    }

    let phone = contact.phone.trim();
    let digits: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    if !PHONE.is_match(&digits) {
        return Err(BookingError::InvalidContact(format!("'{}' is not a valid phone number", phone)));
    }

    Ok(ContactDetails {
        name: name.to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
    })
}
