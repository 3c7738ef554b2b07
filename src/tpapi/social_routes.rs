use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    models,
    tpapi::{
        AppState, blocking,
        error::{ApiResult, AppError},
        extract::ApiJson,
        required,
    },
    tpdb::social::{self, LikeChange, RatingChange},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRequest {
    username: Option<String>,
    listing_id: Option<i64>,
}

impl LikeRequest {
    fn parts(&self) -> ApiResult<(String, i64)> {
        let username = required(&self.username, "username")?.to_string();
        let listing_id = self
            .listing_id
            .ok_or_else(|| AppError::bad_request("Missing required field: listingId"))?;
        Ok((username, listing_id))
    }
}

pub async fn like(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LikeRequest>,
) -> ApiResult<Json<Value>> {
    let (username, listing_id) = request.parts()?;

    let db = state.db.clone();
    let change = blocking(move || Ok(social::like_listing(&db, &username, listing_id)?)).await?;

    match change {
        LikeChange::Added => Ok(Json(json!({ "message": "Listing liked successfully" }))),
        LikeChange::AlreadyLiked => Ok(Json(json!({ "message": "Listing already liked" }))),
        LikeChange::UnknownUser => Err(AppError::NotFound("Username not found".into())),
        LikeChange::UnknownListing => Err(AppError::NotFound("Listing not found".into())),
    }
}

pub async fn unlike(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LikeRequest>,
) -> ApiResult<Json<Value>> {
    let (username, listing_id) = request.parts()?;

    let db = state.db.clone();
    let removed = blocking(move || Ok(social::unlike_listing(&db, &username, listing_id)?)).await?;

    if !removed {
        return Err(AppError::NotFound("Like not found".into()));
    }
    Ok(Json(json!({ "message": "Listing unliked successfully" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRequest {
    username: Option<String>,
    user_rated: Option<String>,
    rating: Option<i64>,
    review_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct Rating {
    rater: String,
    rated: String,
    rating: i64,
    review: Option<String>,
}

fn validate_rating(request: &RateRequest) -> ApiResult<Rating> {
    let rater = required(&request.username, "username")?.to_string();
    let rated = required(&request.user_rated, "userRated")?.to_string();
    let rating = request
        .rating
        .ok_or_else(|| AppError::bad_request("Missing required field: rating"))?;

    if !(models::MIN_RATING..=models::MAX_RATING).contains(&rating) {
        return Err(AppError::bad_request(format!(
            "Rating must be between {} and {}",
            models::MIN_RATING,
            models::MAX_RATING
        )));
    }
    if rater == rated {
        return Err(AppError::bad_request("You cannot rate yourself"));
    }

    let review = request
        .review_description
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    Ok(Rating { rater, rated, rating, review })
}

pub async fn rate(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RateRequest>,
) -> ApiResult<Json<Value>> {
    let Rating { rater, rated, rating, review } = validate_rating(&request)?;

    let db = state.db.clone();
    let change = blocking(move || {
        Ok(social::rate_user(&db, &rater, &rated, rating, review.as_deref())?)
    })
    .await?;

    match change {
        RatingChange::Saved => Ok(Json(json!({ "message": "Rating submitted successfully" }))),
        RatingChange::UnknownUser => Err(AppError::NotFound("Username not found".into())),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnrateRequest {
    username: Option<String>,
    user_rated: Option<String>,
}

pub async fn unrate(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UnrateRequest>,
) -> ApiResult<Json<Value>> {
    let rater = required(&request.username, "username")?.to_string();
    let rated = required(&request.user_rated, "userRated")?.to_string();

    let db = state.db.clone();
    let removed = blocking(move || Ok(social::delete_rating(&db, &rater, &rated)?)).await?;

    if !removed {
        return Err(AppError::NotFound("Rating not found".into()));
    }
    Ok(Json(json!({ "message": "Rating removed successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(rater: &str, rated: &str, rating: i64) -> RateRequest {
        RateRequest {
            username: Some(rater.into()),
            user_rated: Some(rated.into()),
            rating: Some(rating),
            review_description: Some("  Quick to reply.  ".into()),
        }
    }

    #[test]
    fn ratings_are_bounded() {
        for rating in [0, 6, -1] {
            let err = validate_rating(&request("ann", "bob", rating)).unwrap_err();
            assert_eq!(err.to_string(), "Rating must be between 1 and 5");
        }

        let rating = validate_rating(&request("ann", "bob", 5)).unwrap();
        assert_eq!(rating.rating, 5);
        assert_eq!(rating.review.as_deref(), Some("Quick to reply."));
    }

    #[test]
    fn no_self_ratings() {
        let err = validate_rating(&request("ann", "ann", 4)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn like_request_needs_a_listing() {
        let request = LikeRequest { username: Some("ann".into()), listing_id: None };
        assert_eq!(request.parts().unwrap_err().to_string(), "Missing required field: listingId");
    }
}
