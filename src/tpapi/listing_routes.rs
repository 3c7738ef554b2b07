use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    geo::Coordinates,
    models,
    tpapi::{
        AppState, authenticate, blocking,
        error::{ApiResult, AppError},
        extract::{ApiJson, ApiQuery},
        required,
        uploads::{Form, Upload},
    },
    tpdb::{
        feed::{self, DistanceFilter, ListingFilter, ListingQuery, Page},
        listings::{self, ListingDeletion},
    },
};

/// The listing feed's query string, gathered from raw key/value pairs so that list
/// parameters may be repeated (`tags[]=a&tags[]=b`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedParams {
    pub username: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance: Option<f64>,
    pub tags: Vec<String>,
    pub conditions: Vec<String>,
    pub transactions: Vec<String>,
    pub currency: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ApiResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::bad_request(format!("Invalid value for {key}: {value}")))
}

/// Adds a list parameter's value(s). A JSON array literal counts as several values.
fn push_list_value(list: &mut Vec<String>, value: String) {
    match serde_json::from_str::<Vec<String>>(&value) {
        Ok(values) if value.trim_start().starts_with('[') => list.extend(values),
        _ => list.push(value),
    }
}

impl FeedParams {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> ApiResult<Self> {
        let mut params = FeedParams::default();

        for (key, value) in pairs {
            match key.trim_end_matches("[]") {
                "username" => params.username = Some(value).filter(|v| !v.trim().is_empty()),
                "latitude" => params.latitude = Some(parse_number(&key, &value)?),
                "longitude" => params.longitude = Some(parse_number(&key, &value)?),
                "distance" => params.distance = Some(parse_number(&key, &value)?),
                "tags" => push_list_value(&mut params.tags, value),
                "conditions" => push_list_value(&mut params.conditions, value),
                "transactions" => push_list_value(&mut params.transactions, value),
                "currency" => params.currency = Some(value),
                "page" => params.page = Some(parse_number(&key, &value)?),
                "pageSize" => params.page_size = Some(parse_number(&key, &value)?),
                _ => log::trace!("[listings] Ignoring unknown parameter '{key}'."),
            }
        }

        Ok(params)
    }

    /// Turns the parameters into a feed query as of `now`.
    pub fn into_query(self, now: DateTime<Utc>) -> ApiResult<ListingQuery> {
        let origin = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                let origin = Coordinates::new(latitude, longitude);
                if !origin.is_valid() {
                    return Err(AppError::bad_request("Coordinates are out of range"));
                }
                Some(origin)
            }
            _ => None,
        };

        let distance = match self.distance {
            Some(miles) if !miles.is_finite() || miles < 0.0 => {
                return Err(AppError::bad_request("Distance must be a non-negative number"));
            }
            Some(miles) => match origin {
                Some(origin) => DistanceFilter::new(origin, miles),
                None if crate::geo::is_limited(miles) => {
                    return Err(AppError::bad_request(
                        "latitude and longitude are required to filter by distance",
                    ));
                }
                None => None,
            },
            None => None,
        };

        let filter = ListingFilter {
            tags: self.tags,
            conditions: self.conditions,
            transactions: self.transactions,
            currency: self.currency,
            distance,
        };

        Ok(ListingQuery::feed(now)
            .viewed_by(self.username.as_deref())
            .filtered(filter)
            .paged(Page::new(self.page, self.page_size)))
    }
}

pub async fn listings(
    State(state): State<AppState>,
    ApiQuery(pairs): ApiQuery<Vec<(String, String)>>,
) -> ApiResult<Json<Vec<models::ListingView>>> {
    let query = FeedParams::from_pairs(pairs)?.into_query(Utc::now())?;

    let db = state.db.clone();
    let listings = blocking(move || Ok(feed::query_listings(&db, &query)?)).await?;

    Ok(Json(listings))
}

#[derive(Debug, Deserialize)]
struct LocationField {
    latitude: f64,
    longitude: f64,
}

/// Validates the text parts of a listing submission.
fn new_listing_from(form: &Form, now: DateTime<Utc>) -> ApiResult<models::NewListing> {
    let price: f64 = parse_number("price", form.require("price")?)?;
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::bad_request("Price must be a non-negative number"));
    }

    let tags = match form.text("tags") {
        Some(raw) => serde_json::from_str::<Vec<String>>(raw)
            .map_err(|_| AppError::bad_request("tags must be a JSON array of strings"))?,
        None => Vec::new(),
    };

    let location: LocationField = serde_json::from_str(form.require("location")?).map_err(|_| {
        AppError::bad_request("location must be a JSON object with latitude and longitude")
    })?;
    let location = Coordinates::new(location.latitude, location.longitude);
    if !location.is_valid() {
        return Err(AppError::bad_request("Coordinates are out of range"));
    }

    Ok(models::NewListing {
        price,
        title: form.require("title")?.to_string(),
        description: form.text("description").unwrap_or_default().to_string(),
        username: form.require("username")?.to_string(),
        post_date: now,
        location,
        city: form.text("city").map(str::to_string),
        condition: form.require("condition")?.to_string(),
        transaction_preference: form.require("transactionPreference")?.to_string(),
        currency: form.require("currency")?.to_string(),
        currency_symbol: form.require("currencySymbol")?.to_string(),
        tags,
    })
}

pub async fn create_listing(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let form = Form::read(multipart).await?;
    let listing = new_listing_from(&form, Utc::now())?;

    let db = state.db.clone();
    let store = state.images.clone();
    let listing_id = blocking(move || {
        let uploads = form.files().iter().collect::<Vec<&Upload>>();
        let images = store.store_all(&uploads)?;

        match listings::insert_listing(&db, &listing, &images) {
            Ok(Some(listing_id)) => Ok(listing_id),
            Ok(None) => {
                store.discard_all(&images);
                Err(AppError::NotFound("Username not found".into()))
            }
            Err(err) => {
                store.discard_all(&images);
                Err(err.into())
            }
        }
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Listing created successfully", "listingId": listing_id })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteListingRequest {
    username: Option<String>,
    password: Option<String>,
    listing_id: Option<i64>,
}

pub async fn delete_listing(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DeleteListingRequest>,
) -> ApiResult<Json<Value>> {
    let username = required(&request.username, "username")?.to_string();
    let password = required(&request.password, "password")?.to_string();
    let listing_id = request
        .listing_id
        .ok_or_else(|| AppError::bad_request("Missing required field: listingId"))?;

    let db = state.db.clone();
    let outcome = blocking(move || {
        authenticate(&db, &username, &password)?;
        Ok(listings::delete_listing(&db, &username, listing_id)?)
    })
    .await?;

    match outcome {
        ListingDeletion::Deleted => Ok(Json(json!({ "message": "Listing deleted successfully" }))),
        ListingDeletion::NotFound => Err(AppError::NotFound("Listing not found".into())),
        ListingDeletion::NotOwner => {
            Err(AppError::Unauthorized("You can only delete your own listings".into()))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteListingsRequest {
    username: Option<String>,
    password: Option<String>,
    listing_ids: Option<Vec<i64>>,
}

pub async fn delete_listings(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DeleteListingsRequest>,
) -> ApiResult<Json<Value>> {
    let username = required(&request.username, "username")?.to_string();
    let password = required(&request.password, "password")?.to_string();

    let db = state.db.clone();
    let deleted = blocking(move || {
        authenticate(&db, &username, &password)?;
        Ok(listings::delete_listings(&db, &username, request.listing_ids.as_deref())?)
    })
    .await?;

    Ok(Json(json!({ "message": "Listings deleted successfully", "deleted": deleted })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagesQuery {
    listing_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    #[serde(rename = "Images")]
    images: Vec<models::ImageRecord>,
}

pub async fn images(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ImagesQuery>,
) -> ApiResult<Json<ImagesResponse>> {
    let listing_id = query
        .listing_id
        .ok_or_else(|| AppError::bad_request("Missing required field: listingId"))?;

    let db = state.db.clone();
    let images = blocking(move || Ok(listings::query_images(&db, listing_id)?)).await?;

    Ok(Json(ImagesResponse { images }))
}

pub async fn tags(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let db = state.db.clone();
    let tags = blocking(move || Ok(listings::query_tag_names(&db)?)).await?;

    Ok(Json(tags))
}
