use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    models,
    tpapi::{
        AppState, account_routes::is_valid_email, authenticate, blocking,
        error::{ApiResult, AppError},
        extract::{ApiJson, ApiQuery},
        required,
        uploads::Form,
    },
    tpdb::profiles::{self, ProfileChange, ProfileUpdate},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileQuery {
    username: Option<String>,
    password: Option<String>,
    profile_name: Option<String>,
}

pub async fn profile(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProfileQuery>,
) -> ApiResult<Json<models::ProfileView>> {
    let profile_name = required(&query.profile_name, "profileName")?.to_string();
    let username = required(&query.username, "username")?.to_string();
    let password = required(&query.password, "password")?.to_string();

    let db = state.db.clone();
    let profile = blocking(move || {
        authenticate(&db, &username, &password)?;
        Ok(profiles::query_profile(&db, &profile_name, &username)?)
    })
    .await?;

    profile
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))
}

/// The text half of a profile edit.
#[derive(Debug, Clone, PartialEq)]
struct ProfileEdit {
    username: String,
    password: String,
    email: Option<String>,
}

fn profile_edit_from(form: &Form) -> ApiResult<ProfileEdit> {
    let username = form.require("username")?.to_string();
    let password = form.require("password")?.to_string();

    if form.text("profileName").is_some_and(|name| name != username) {
        return Err(AppError::Unauthorized("You can only edit your own profile".into()));
    }

    let email = form.text("email").map(str::to_string);
    if email.as_deref().is_some_and(|email| !is_valid_email(email)) {
        return Err(AppError::bad_request("Invalid email address"));
    }

    Ok(ProfileEdit { username, password, email })
}

pub async fn edit_profile(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let form = Form::read(multipart).await?;
    let ProfileEdit { username, password, email } = profile_edit_from(&form)?;

    let db = state.db.clone();
    let store = state.images.clone();
    blocking(move || {
        authenticate(&db, &username, &password)?;

        let uploads = [
            form.files_named("profilePicture").next(),
            form.files_named("coverPicture").next(),
        ];
        let stored = store.store_all(&uploads.iter().flatten().copied().collect::<Vec<_>>())?;

        // Stored images come back in the same order as the uploads that were present
        let mut stored_uris = stored.iter().map(|image| image.uri.as_str());
        let [profile_picture, cover_picture] =
            uploads.map(|upload| upload.and_then(|_| stored_uris.next()));

        let update = ProfileUpdate { email: email.as_deref(), profile_picture, cover_picture };
        match profiles::update_profile(&db, &username, &update) {
            Ok(ProfileChange::Updated) => Ok(()),
            Ok(ProfileChange::EmailTaken) => {
                store.discard_all(&stored);
                Err(AppError::Conflict("Email already exists".into()))
            }
            Err(err) => {
                store.discard_all(&stored);
                Err(err.into())
            }
        }
    })
    .await?;

    Ok(Json(json!({ "message": "Profile updated successfully" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfoRequest {
    username: Option<String>,
    password: Option<String>,
    contact_info: Option<models::ContactInfoUpdate>,
}

pub async fn edit_contact_info(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ContactInfoRequest>,
) -> ApiResult<Json<Value>> {
    let username = required(&request.username, "username")?.to_string();
    let password = required(&request.password, "password")?.to_string();
    let update = request
        .contact_info
        .ok_or_else(|| AppError::bad_request("Missing required field: contactInfo"))?;

    let db = state.db.clone();
    blocking(move || {
        authenticate(&db, &username, &password)?;
        Ok(profiles::update_contact_info(&db, &username, &update)?)
    })
    .await?;

    Ok(Json(json!({ "message": "Contact info updated successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_owner_edits_a_profile() {
        let form = Form::from_parts(
            &[("username", "ann"), ("password", "pw"), ("profileName", "bob")],
            vec![],
        );
        assert!(matches!(profile_edit_from(&form), Err(AppError::Unauthorized(_))));

        let form = Form::from_parts(
            &[("username", "ann"), ("password", "pw"), ("profileName", "ann")],
            vec![],
        );
        assert_eq!(
            profile_edit_from(&form).unwrap(),
            ProfileEdit { username: "ann".into(), password: "pw".into(), email: None }
        );
    }

    #[test]
    fn edited_emails_are_validated() {
        let form = Form::from_parts(
            &[("username", "ann"), ("password", "pw"), ("email", "not-an-email")],
            vec![],
        );
        assert_eq!(profile_edit_from(&form).unwrap_err().to_string(), "Invalid email address");
    }
}
