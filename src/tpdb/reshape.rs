//! Turns flat aggregation rows into the listing objects clients consume.
//!
//! Nothing in here touches the database.

use chrono::DateTime;

use std::collections::HashMap;

use crate::{geo, models};

/// Average and count of the ratings a listing's owner has received.
///
/// Both are `None` when nobody has rated the owner yet.
pub fn rating_summary(average: Option<f64>, count: i64) -> models::RatingSummary {
    if count == 0 {
        return models::RatingSummary { average_rating: None, rating_count: None };
    }

    models::RatingSummary {
        average_rating: average.map(geo::round_tenth),
        rating_count: Some(count),
    }
}

pub fn reshape_listing(
    row: models::ListingRow,
    tags: Vec<String>,
    images: Vec<models::ListingImage>,
) -> models::ListingView {
    models::ListingView {
        ratings: rating_summary(row.average_rating, row.rating_count),
        post_date: DateTime::from_timestamp_millis(row.post_date).unwrap_or_default(),
        distance: row.distance.map(geo::round_tenth),

        listing_id: row.listing_id,
        price: row.price,
        title: row.title,
        description: row.description,
        username: row.username,
        latitude: row.latitude,
        longitude: row.longitude,
        city: row.city,
        condition: row.condition,
        transaction_preference: row.transaction_preference,
        currency: row.currency,
        currency_symbol: row.currency_symbol,

        tags,
        images,
        profile_picture: row.profile_picture,
        liked: row.liked,
    }
}

/// Attaches each row's tags and images, keeping the row order.
pub fn reshape_listings(
    rows: Vec<models::ListingRow>,
    mut tags: HashMap<i64, Vec<String>>,
    mut images: HashMap<i64, Vec<models::ListingImage>>,
) -> Vec<models::ListingView> {
    rows.into_iter()
        .map(|row| {
            let listing_tags = tags.remove(&row.listing_id).unwrap_or_default();
            let listing_images = images.remove(&row.listing_id).unwrap_or_default();
            reshape_listing(row, listing_tags, listing_images)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(listing_id: i64) -> models::ListingRow {
        models::ListingRow {
            listing_id,
            price: 120.0,
            title: "Road bike".to_string(),
            description: "54cm frame".to_string(),
            username: "ann".to_string(),
            post_date: 1_760_000_000_000,
            latitude: 37.7749,
            longitude: -122.4194,
            city: Some("San Francisco".to_string()),
            condition: "Used".to_string(),
            transaction_preference: "Pickup".to_string(),
            currency: "USD".to_string(),
            currency_symbol: "$".to_string(),
            profile_picture: None,
            liked: false,
            average_rating: None,
            rating_count: 0,
            distance: None,
        }
    }

    fn image(n: usize) -> models::ListingImage {
        models::ListingImage { uri: format!("/uploads/{n}.jpg"), blurhash: format!("hash{n}") }
    }

    #[test]
    fn unrated_owner_has_null_ratings() {
        let summary = rating_summary(None, 0);
        assert_eq!(summary.average_rating, None);
        assert_eq!(summary.rating_count, None);
    }

    #[test]
    fn averages_are_rounded_to_one_decimal() {
        let summary = rating_summary(Some(11.0 / 3.0), 3);
        assert_eq!(summary.average_rating, Some(3.7));
        assert_eq!(summary.rating_count, Some(3));
    }

    #[test]
    fn images_keep_their_pairing_and_order() {
        let images: Vec<_> = (0..4).map(image).collect();
        let view = reshape_listing(row(1), vec![], images.clone());

        assert_eq!(view.images.len(), 4);
        for (i, listing_image) in view.images.iter().enumerate() {
            assert_eq!(listing_image.uri, format!("/uploads/{i}.jpg"));
            assert_eq!(listing_image.blurhash, format!("hash{i}"));
        }
    }

    #[test]
    fn missing_tags_and_images_become_empty_lists() {
        let mut tags = HashMap::new();
        tags.insert(2, vec!["bikes".to_string()]);

        let views = reshape_listings(vec![row(2), row(1)], tags, HashMap::new());

        assert_eq!(views[0].listing_id, 2);
        assert_eq!(views[0].tags, vec!["bikes"]);
        assert!(views[1].tags.is_empty());
        assert!(views[1].images.is_empty());
    }

    #[test]
    fn serialized_shape() {
        let mut listing_row = row(7);
        listing_row.liked = true;
        listing_row.distance = Some(8.4321);

        let json = serde_json::to_value(reshape_listing(listing_row, vec!["bikes".into()], vec![image(0)]))
            .unwrap();

        assert_eq!(json["listingId"], 7);
        assert_eq!(json["liked"], true);
        assert_eq!(json["distance"], 8.4);
        assert_eq!(json["tags"][0], "bikes");
        assert_eq!(json["images"][0]["blurhash"], "hash0");
        assert!(json["ratings"]["averageRating"].is_null());
        assert!(json["ratings"]["ratingCount"].is_null());
        assert!(json["postDate"].is_string());
    }
}
