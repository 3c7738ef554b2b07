use axum::{Json, extract::State, http::StatusCode};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};

use std::sync::LazyLock;

use crate::{
    models,
    tpapi::{
        AppState, authenticate, blocking,
        error::{ApiResult, AppError},
        extract::{ApiJson, ApiQuery},
        required,
    },
    tpdb::accounts::{self, Registration},
};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    username: Option<String>,
    password: Option<String>,
    confirm_password: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    username: Option<String>,
    password: Option<String>,
}

/// Checks a registration payload and turns it into an account.
fn validate_registration(request: &RegisterRequest) -> ApiResult<models::Account> {
    let username = required(&request.username, "username")?;
    let password = required(&request.password, "password")?;
    let confirm_password = required(&request.confirm_password, "confirmPassword")?;
    let email = required(&request.email, "email")?.trim();

    // Every other endpoint compares usernames verbatim
    if username.trim() != username {
        return Err(AppError::bad_request("Username cannot start or end with whitespace"));
    }
    if password != confirm_password {
        return Err(AppError::bad_request("Passwords do not match"));
    }
    if !is_valid_email(email) {
        return Err(AppError::bad_request("Invalid email address"));
    }

    Ok(models::Account {
        username: username.to_string(),
        password: password.to_string(),
        email: email.to_string(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let account = validate_registration(&request)?;

    let db = state.db.clone();
    let username = account.username.clone();
    let outcome = blocking(move || Ok(accounts::insert_account(&db, &account)?)).await?;

    match outcome {
        Registration::Created => Ok((
            StatusCode::CREATED,
            Json(json!({ "message": "Account created successfully", "username": username })),
        )),
        Registration::UsernameTaken => Err(AppError::Conflict("Username already exists".into())),
        Registration::EmailTaken => Err(AppError::Conflict("Email already exists".into())),
    }
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<Json<Value>> {
    let username = required(&credentials.username, "username")?.to_string();
    let password = required(&credentials.password, "password")?.to_string();

    let db = state.db.clone();
    blocking(move || authenticate(&db, &username, &password)).await?;

    Ok(Json(json!({ "message": "Login successful" })))
}

pub async fn list_accounts(State(state): State<AppState>) -> ApiResult<Json<Vec<models::AccountSummary>>> {
    let db = state.db.clone();
    let accounts = blocking(move || Ok(accounts::query_accounts(&db)?)).await?;

    Ok(Json(accounts))
}

pub async fn delete_account(
    State(state): State<AppState>,
    ApiQuery(credentials): ApiQuery<Credentials>,
) -> ApiResult<Json<Value>> {
    let username = required(&credentials.username, "username")?.to_string();
    let password = required(&credentials.password, "password")?.to_string();

    let db = state.db.clone();
    blocking(move || {
        authenticate(&db, &username, &password)?;
        if !accounts::delete_account(&db, &username)? {
            return Err(AppError::Unauthorized("Username not found".into()));
        }
        Ok(())
    })
    .await?;

    Ok(Json(json!({ "message": "Account deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(password: &str, confirm: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: Some("ann".into()),
            password: Some(password.into()),
            confirm_password: Some(confirm.into()),
            email: Some(email.into()),
        }
    }

    #[test]
    fn emails() {
        assert!(is_valid_email("ann@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.co"));
        assert!(!is_valid_email("ann@example"));
        assert!(!is_valid_email("ann example@x.com"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn registration_validation() {
        assert!(validate_registration(&request("pw", "pw", "ann@example.com")).is_ok());

        let err = validate_registration(&request("pw", "other", "ann@example.com")).unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match");

        let err = validate_registration(&request("pw", "pw", "nope")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid email address");

        let padded = RegisterRequest { username: Some("ann ".into()), ..request("pw", "pw", "ann@example.com") };
        let err = validate_registration(&padded).unwrap_err();
        assert_eq!(err.to_string(), "Username cannot start or end with whitespace");

        let missing = RegisterRequest { username: None, ..request("pw", "pw", "ann@example.com") };
        assert!(matches!(validate_registration(&missing), Err(AppError::BadRequest(_))));
    }
}
