use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    error::{AppError, AppResult},
    models::{FormField, PaymentForm},
};

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Checks required fields first, then field lengths, then the email format.
pub fn validate_form(form: &PaymentForm) -> AppResult<()> {
    let missing = FormField::ALL
        .into_iter()
        .filter(|field| field.is_required() && form.get(*field).is_empty())
        .map(FormField::wire_name)
        .collect::<Vec<_>>();

    if !missing.is_empty() {
        return Err(AppError::MissingFields(missing));
    }

    let too_long = FormField::ALL
        .into_iter()
        .filter(|field| form.get(*field).chars().count() > field.max_len())
        .map(FormField::wire_name)
        .collect::<Vec<_>>();

    if !too_long.is_empty() {
        return Err(AppError::FieldsTooLong(too_long));
    }

    if !is_valid_email(&form.email) {
        return Err(AppError::InvalidEmail);
    }

    Ok(())
}
