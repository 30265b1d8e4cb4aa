use std::str::FromStr;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::{macros::format_description, Date};
use uuid::Uuid;

use crate::{
    crypto::{AmountError, AmountInput},
    error::{ApiError, FieldError},
};

/// Body fields that are never rewritten by [`sanitize_body`].
const UNSANITIZED_FIELDS: [&str; 1] = ["Password"];

pub fn sanitize_input(input: &str) -> String {
    input.replace(['<', '>'], "").trim().to_string()
}

/// Strips angle brackets and surrounding whitespace from top-level string fields.
pub fn sanitize_body(body: &mut Value) {
    if let Value::Object(map) = body {
        for (key, value) in map.iter_mut() {
            if UNSANITIZED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            if let Value::String(s) = value {
                *s = sanitize_input(s);
            }
        }
    }
}

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    // `[year]` alone also accepts a sign and extra digits.
    static ref DATE_RE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Path ids that are not UUIDs name no record, so they read as not found.
pub fn record_id(raw: &str, not_found: &str) -> Result<Uuid, ApiError> {
    raw.parse::<Uuid>()
        .map_err(|_| ApiError::NotFound(not_found.to_string()))
}

fn present_value(value: Option<Value>) -> Option<Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        other => other,
    }
}

/// JSON body extractor that sanitizes input and reports failures as envelopes.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(mut body) = Json::<Value>::from_request(req, state).await?;
        sanitize_body(&mut body);
        let payload = serde_json::from_value(body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?;
        Ok(ValidJson(payload))
    }
}

/// Query string extractor whose failures use the response envelope.
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid query string: {}", e.body_text())))?;
        Ok(ValidQuery(query))
    }
}

/// Collects field errors so a request reports every problem at once.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn require_text(
        &mut self,
        field: &str,
        value: Option<String>,
        message: &str,
    ) -> Option<String> {
        match value {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                self.error(field, message);
                None
            }
        }
    }

    /// An absent value is fine; a present one must not be empty.
    pub fn optional_text(
        &mut self,
        field: &str,
        value: Option<String>,
        message: &str,
    ) -> Option<String> {
        match value {
            Some(v) if v.is_empty() => {
                self.error(field, message);
                None
            }
            other => other,
        }
    }

    pub fn date(&mut self, field: &str, value: &str) -> Option<Date> {
        let format = format_description!("[year]-[month]-[day]");
        let parsed = DATE_RE
            .is_match(value)
            .then(|| Date::parse(value, format).ok())
            .flatten();
        match parsed {
            Some(d) => Some(d),
            None => {
                self.error(field, "Invalid date format");
                None
            }
        }
    }

    /// Checks an amount and returns it together with its rounded value.
    pub fn amount(&mut self, field: &str, value: &Value) -> Option<(AmountInput, f64)> {
        let Some(input) = AmountInput::from_json(value) else {
            self.error(field, "Amount must be a number");
            return None;
        };
        match input.to_rounded() {
            Ok(rounded) => Some((input, rounded)),
            Err(AmountError::InvalidAmount(message)) => {
                self.error(field, message);
                None
            }
            Err(_) => {
                self.error(field, "Amount must be a number");
                None
            }
        }
    }

    pub fn one_of<T: FromStr>(&mut self, field: &str, value: &str, message: &str) -> Option<T> {
        match value.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.error(field, message);
                None
            }
        }
    }

    pub fn length(
        &mut self,
        field: &str,
        value: &str,
        min: usize,
        max: usize,
        message: &str,
    ) -> bool {
        let len = value.chars().count();
        let ok = (min..=max).contains(&len);
        if !ok {
            self.error(field, message);
        }
        ok
    }

    /// Missing, null and empty-string amounts count as absent.
    pub fn required_amount(
        &mut self,
        field: &str,
        value: Option<Value>,
        message: &str,
    ) -> Option<(AmountInput, f64)> {
        match present_value(value) {
            Some(v) => self.amount(field, &v),
            None => {
                self.error(field, message);
                None
            }
        }
    }

    pub fn optional_amount(
        &mut self,
        field: &str,
        value: Option<Value>,
    ) -> Option<(AmountInput, f64)> {
        present_value(value).and_then(|v| self.amount(field, &v))
    }

    pub fn required_date(
        &mut self,
        field: &str,
        value: Option<String>,
        message: &str,
    ) -> Option<Date> {
        match value.filter(|s| !s.is_empty()) {
            Some(raw) => self.date(field, &raw),
            None => {
                self.error(field, message);
                None
            }
        }
    }

    pub fn optional_date(&mut self, field: &str, value: Option<String>) -> Option<Date> {
        value.and_then(|raw| self.date(field, &raw))
    }

    pub fn required_choice<T: FromStr>(
        &mut self,
        field: &str,
        value: Option<String>,
        required: &str,
        invalid: &str,
    ) -> Option<T> {
        match value.filter(|s| !s.is_empty()) {
            Some(raw) => self.one_of(field, &raw, invalid),
            None => {
                self.error(field, required);
                None
            }
        }
    }

    pub fn optional_choice<T: FromStr>(
        &mut self,
        field: &str,
        value: Option<String>,
        invalid: &str,
    ) -> Option<T> {
        value.and_then(|raw| self.one_of(field, &raw, invalid))
    }

    /// Empty strings count as absent.
    pub fn optional_id(
        &mut self,
        field: &str,
        value: Option<String>,
        message: &str,
    ) -> Option<Uuid> {
        let raw = value.filter(|s| !s.is_empty())?;
        match raw.parse::<Uuid>() {
            Ok(id) => Some(id),
            Err(_) => {
                self.error(field, message);
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Category;
    use serde_json::json;

    #[test]
    fn sanitize_strips_brackets_and_trims() {
        assert_eq!(sanitize_input("  <b>Lunch</b> "), "bLunch/b");
        assert_eq!(sanitize_input("plain"), "plain");
    }

    #[test]
    fn sanitize_body_skips_passwords_and_non_strings() {
        let mut body = json!({
            "Description": " <script>x</script> ",
            "Password": " <secret> ",
            "Amount": 12.5,
        });
        sanitize_body(&mut body);
        assert_eq!(body["Description"], "scriptx/script");
        assert_eq!(body["Password"], " <secret> ");
        assert_eq!(body["Amount"], 12.5);
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("not an email"));
    }

    #[test]
    fn validator_aggregates_every_field() {
        let mut v = Validator::new();
        assert!(v
            .require_text("Description", Some(String::new()), "Description is required")
            .is_none());
        assert!(v.date("DateOfNeeded", "2024-13-40").is_none());
        assert!(v.amount("Amount", &json!(-3)).is_none());
        assert!(v.one_of::<Category>("ExpenseType", "Food", "Invalid expense type").is_none());
        let Err(ApiError::Validation(errors)) = v.finish() else {
            panic!("expected validation error");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["Description", "DateOfNeeded", "Amount", "ExpenseType"]);
        assert_eq!(errors[2].message, "Amount cannot be negative");
    }

    #[test]
    fn validator_accepts_good_values() {
        let mut v = Validator::new();
        let date = v.date("DateConsumed", "2024-02-29").unwrap();
        assert_eq!(date.to_string(), "2024-02-29");
        let (_, rounded) = v.amount("Amount", &json!("100.999")).unwrap();
        assert_eq!(rounded, 101.0);
        assert_eq!(v.optional_text("Department", None, "empty"), None);
        assert!(v.length("Username", "bob", 3, 100, "bad"));
        assert!(v.finish().is_ok());
    }

    #[test]
    fn dates_need_a_plain_four_digit_year() {
        let mut v = Validator::new();
        assert!(v.date("DateOfNeeded", "+2024-05-01").is_none());
        assert!(v.date("DateOfNeeded", "-2024-05-01").is_none());
        assert!(v.date("DateOfNeeded", "2024-5-01").is_none());
        let Err(ApiError::Validation(errors)) = v.finish() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| e.message == "Invalid date format"));

        let mut v = Validator::new();
        assert_eq!(v.date("DateOfNeeded", "2024-05-01").unwrap().to_string(), "2024-05-01");
        assert!(v.finish().is_ok());
    }

    #[test]
    fn record_ids_that_are_not_uuids_are_not_found() {
        let id = Uuid::new_v4();
        assert_eq!(record_id(&id.to_string(), "Expense not found").unwrap(), id);
        let Err(ApiError::NotFound(message)) = record_id("42", "Expense not found") else {
            panic!("expected not found");
        };
        assert_eq!(message, "Expense not found");
    }

    #[test]
    fn required_helpers_treat_empty_as_missing() {
        let mut v = Validator::new();
        assert!(v.required_amount("Amount", Some(json!("")), "Amount is required").is_none());
        assert!(v
            .required_date("DateConsumed", Some(String::new()), "Date consumed is required")
            .is_none());
        assert!(v
            .required_choice::<Category>(
                "ExpenseType",
                None,
                "Expense type is required",
                "Invalid expense type",
            )
            .is_none());
        assert!(v.optional_amount("Amount", Some(serde_json::Value::Null)).is_none());
        assert!(v.optional_id("LinkedCashRequestId", Some(String::new()), "bad").is_none());
        assert!(v
            .optional_id("LinkedCashRequestId", Some("7".into()), "Invalid cash request id")
            .is_none());
        let Err(ApiError::Validation(errors)) = v.finish() else {
            panic!("expected validation error");
        };
        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            [
                "Amount is required",
                "Date consumed is required",
                "Expense type is required",
                "Invalid cash request id",
            ]
        );
    }

    #[test]
    fn amount_must_be_number_or_numeric_string() {
        let mut v = Validator::new();
        assert!(v.amount("Amount", &json!(true)).is_none());
        assert!(v.amount("Amount", &json!("abc")).is_none());
        let Err(ApiError::Validation(errors)) = v.finish() else {
            panic!("expected validation error");
        };
        assert_eq!(errors[0].message, "Amount must be a number");
        assert_eq!(errors[1].message, "Amount must be a valid number");
    }
}
