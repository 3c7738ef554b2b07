use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;

// Listings older than 14 days drop out of the feed
pub const FRESHNESS_WINDOW_DAYS: i64 = 14;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

#[derive(Debug, Clone)]
pub struct Account {
    pub username: String,
    pub password: String,
    pub email: String,
}

/// What `/accounts` exposes about an account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummary {
    pub username: String,
    pub email: String,
}

/// A listing as submitted, before it has an id.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub price: f64,
    pub title: String,
    pub description: String,
    pub username: String,
    pub post_date: DateTime<Utc>,
    pub location: Coordinates,
    pub city: Option<String>,
    pub condition: String,
    pub transaction_preference: String,
    pub currency: String,
    pub currency_symbol: String,
    pub tags: Vec<String>,
}

/// An uploaded image once it has been written somewhere servable.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub uri: String,
    pub blurhash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub image_id: i64,
    pub uri: String,
    pub blurhash: String,
}

/// One flat row of the listing aggregation query.
#[derive(Debug, Clone)]
pub struct ListingRow {
    pub listing_id: i64,
    pub price: f64,
    pub title: String,
    pub description: String,
    pub username: String,
    pub post_date: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
    pub condition: String,
    pub transaction_preference: String,
    pub currency: String,
    pub currency_symbol: String,

    pub profile_picture: Option<String>,
    pub liked: bool,
    pub average_rating: Option<f64>,
    pub rating_count: i64,

    pub distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingImage {
    pub uri: String,
    pub blurhash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub average_rating: Option<f64>,
    pub rating_count: Option<i64>,
}

/// A listing in the shape clients consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingView {
    pub listing_id: i64,
    pub price: f64,
    pub title: String,
    pub description: String,
    pub username: String,
    pub post_date: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
    pub condition: String,
    pub transaction_preference: String,
    pub currency: String,
    pub currency_symbol: String,

    pub tags: Vec<String>,
    pub images: Vec<ListingImage>,
    pub profile_picture: Option<String>,
    pub liked: bool,
    pub ratings: RatingSummary,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub username: String,
    pub rating: i64,
    pub review_description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactInfo {
    pub phone_number: Option<String>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub twitter: Option<String>,
}

/// Which contact fields other users may see.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Visibility {
    pub show_email: bool,
    pub show_phone_number: bool,
    pub show_instagram: bool,
    pub show_facebook: bool,
    pub show_twitter: bool,
}

pub const DEFAULT_VISIBILITY: Visibility = Visibility {
    show_email: false,
    show_phone_number: false,
    show_instagram: true,
    show_facebook: true,
    show_twitter: true,
};

/// A partial contact info edit. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfoUpdate {
    pub phone_number: Option<String>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub twitter: Option<String>,

    pub show_email: Option<bool>,
    pub show_phone_number: Option<bool>,
    pub show_instagram: Option<bool>,
    pub show_facebook: Option<bool>,
    pub show_twitter: Option<bool>,
}

/// Contact details as seen by a particular viewer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactCard {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePictures {
    pub profile_picture: Option<String>,
    pub cover_picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRatings {
    pub average_rating: Option<f64>,
    pub rating_count: Option<i64>,
    pub reviews: Vec<Review>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub username: String,
    pub profile_picture: Option<String>,
    pub cover_picture: Option<String>,
    pub is_owner: bool,

    pub listings: Vec<ListingView>,
    pub liked_listings: Vec<ListingView>,

    pub ratings: ProfileRatings,
    pub viewer_rating: Option<i64>,
    pub contact_info: ContactCard,
}
