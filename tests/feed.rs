use chrono::{Duration, Utc};
use tempfile::TempDir;

use tradepost::{
    geo::Coordinates,
    models::{self, NewListing, StoredImage},
    tpdb::{
        Database, accounts,
        feed::{self, DistanceFilter, ListingFilter, ListingQuery},
        listings,
        social::{self, LikeChange},
    },
};

const SAN_FRANCISCO: Coordinates = Coordinates { latitude: 37.7749, longitude: -122.4194 };
const OAKLAND: Coordinates = Coordinates { latitude: 37.8044, longitude: -122.2712 };
const LOS_ANGELES: Coordinates = Coordinates { latitude: 34.0522, longitude: -118.2437 };

fn setup() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("feed.db"));
    db.initialize().unwrap();

    for name in ["ann", "bob", "cy"] {
        let account = models::Account {
            username: name.to_string(),
            password: "pw".to_string(),
            email: format!("{name}@example.com"),
        };
        assert_eq!(accounts::insert_account(&db, &account).unwrap(), accounts::Registration::Created);
    }

    (dir, db)
}

fn listing(username: &str, title: &str, location: Coordinates, tags: &[&str]) -> NewListing {
    NewListing {
        price: 25.0,
        title: title.to_string(),
        description: String::new(),
        username: username.to_string(),
        post_date: Utc::now(),
        location,
        city: None,
        condition: "Used".to_string(),
        transaction_preference: "Pickup".to_string(),
        currency: "USD".to_string(),
        currency_symbol: "$".to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

fn insert(db: &Database, listing: &NewListing) -> i64 {
    listings::insert_listing(db, listing, &[]).unwrap().unwrap()
}

fn titles(views: &[models::ListingView]) -> Vec<&str> {
    views.iter().map(|v| v.title.as_str()).collect()
}

#[test]
fn newest_first_and_stale_listings_drop_out() {
    let (_dir, db) = setup();

    insert(&db, &listing("ann", "bike", SAN_FRANCISCO, &[]));
    insert(&db, &listing("bob", "lamp", SAN_FRANCISCO, &[]));

    let mut stale = listing("cy", "old couch", SAN_FRANCISCO, &[]);
    stale.post_date = Utc::now() - Duration::days(models::FRESHNESS_WINDOW_DAYS + 1);
    insert(&db, &stale);

    let feed = feed::query_listings(&db, &ListingQuery::feed(Utc::now())).unwrap();
    assert_eq!(titles(&feed), vec!["lamp", "bike"]);

    // Profile tabs ignore the window
    let owned = feed::query_listings(&db, &ListingQuery::owned_by("cy")).unwrap();
    assert_eq!(titles(&owned), vec!["old couch"]);
}

#[test]
fn tag_filter_matches_any_tag_without_duplicates() {
    let (_dir, db) = setup();

    insert(&db, &listing("ann", "bike", SAN_FRANCISCO, &["bikes", "outdoors"]));
    insert(&db, &listing("ann", "tent", SAN_FRANCISCO, &["outdoors"]));
    insert(&db, &listing("bob", "lamp", SAN_FRANCISCO, &["home"]));

    let filter = ListingFilter {
        tags: vec!["bikes".to_string(), "outdoors".to_string()],
        ..Default::default()
    };
    let feed = feed::query_listings(&db, &ListingQuery::feed(Utc::now()).filtered(filter)).unwrap();

    assert_eq!(titles(&feed), vec!["tent", "bike"]);
    assert_eq!(feed[1].tags, vec!["bikes", "outdoors"]);
}

#[test]
fn distance_filter_and_unlimited_sentinel() {
    let (_dir, db) = setup();

    insert(&db, &listing("ann", "oakland bike", OAKLAND, &[]));
    insert(&db, &listing("bob", "la lamp", LOS_ANGELES, &[]));

    let nearby = ListingFilter {
        distance: DistanceFilter::new(SAN_FRANCISCO, 25.0),
        ..Default::default()
    };
    let feed = feed::query_listings(&db, &ListingQuery::feed(Utc::now()).filtered(nearby)).unwrap();
    assert_eq!(titles(&feed), vec!["oakland bike"]);

    let distance = feed[0].distance.unwrap();
    assert!((distance - 8.4).abs() < 0.5, "unexpected distance {distance}");

    assert_eq!(DistanceFilter::new(SAN_FRANCISCO, 510.0), None);
    let everywhere = feed::query_listings(&db, &ListingQuery::feed(Utc::now())).unwrap();
    assert_eq!(everywhere.len(), 2);
}

#[test]
fn images_keep_upload_order() {
    let (_dir, db) = setup();

    let images = ["/uploads/a.png", "/uploads/b.png", "/uploads/c.png"]
        .iter()
        .map(|uri| StoredImage { uri: uri.to_string(), blurhash: format!("hash-{uri}") })
        .collect::<Vec<_>>();
    let id = listings::insert_listing(&db, &listing("ann", "bike", SAN_FRANCISCO, &[]), &images)
        .unwrap()
        .unwrap();

    let feed = feed::query_listings(&db, &ListingQuery::feed(Utc::now())).unwrap();
    let uris = feed[0].images.iter().map(|i| i.uri.as_str()).collect::<Vec<_>>();
    assert_eq!(uris, vec!["/uploads/a.png", "/uploads/b.png", "/uploads/c.png"]);
    assert_eq!(feed[0].images[1].blurhash, "hash-/uploads/b.png");

    let records = listings::query_images(&db, id).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].uri, "/uploads/a.png");
}

#[test]
fn likes_are_idempotent_and_flagged_for_the_viewer() {
    let (_dir, db) = setup();
    let id = insert(&db, &listing("ann", "bike", SAN_FRANCISCO, &[]));

    assert_eq!(social::like_listing(&db, "bob", id).unwrap(), LikeChange::Added);
    assert_eq!(social::like_listing(&db, "bob", id).unwrap(), LikeChange::AlreadyLiked);
    assert_eq!(social::like_listing(&db, "nobody", id).unwrap(), LikeChange::UnknownUser);
    assert_eq!(social::like_listing(&db, "bob", id + 100).unwrap(), LikeChange::UnknownListing);

    let as_bob = feed::query_listings(&db, &ListingQuery::feed(Utc::now()).viewed_by(Some("bob"))).unwrap();
    assert!(as_bob[0].liked);
    let as_cy = feed::query_listings(&db, &ListingQuery::feed(Utc::now()).viewed_by(Some("cy"))).unwrap();
    assert!(!as_cy[0].liked);

    let liked = feed::query_listings(&db, &ListingQuery::liked_by("bob")).unwrap();
    assert_eq!(titles(&liked), vec!["bike"]);

    assert!(social::unlike_listing(&db, "bob", id).unwrap());
    assert!(!social::unlike_listing(&db, "bob", id).unwrap());
}

#[test]
fn rerating_replaces_the_earlier_rating() {
    let (_dir, db) = setup();
    insert(&db, &listing("ann", "bike", SAN_FRANCISCO, &[]));

    let feed_now = || feed::query_listings(&db, &ListingQuery::feed(Utc::now())).unwrap();
    assert_eq!(feed_now()[0].ratings.average_rating, None);
    assert_eq!(feed_now()[0].ratings.rating_count, None);

    social::rate_user(&db, "bob", "ann", 2, None).unwrap();
    social::rate_user(&db, "bob", "ann", 4, Some("Great seller")).unwrap();

    let ratings = &feed_now()[0].ratings;
    assert_eq!(ratings.average_rating, Some(4.0));
    assert_eq!(ratings.rating_count, Some(1));

    social::rate_user(&db, "cy", "ann", 5, None).unwrap();
    let ratings = &feed_now()[0].ratings;
    assert_eq!(ratings.average_rating, Some(4.5));
    assert_eq!(ratings.rating_count, Some(2));

    assert_eq!(social::query_rating(&db, "bob", "ann").unwrap(), Some(4));
}

#[test]
fn deleting_a_listing_takes_its_likes_and_images() {
    let (_dir, db) = setup();

    let images = [StoredImage { uri: "/uploads/a.png".into(), blurhash: "h".into() }];
    let id = listings::insert_listing(&db, &listing("ann", "bike", SAN_FRANCISCO, &[]), &images)
        .unwrap()
        .unwrap();
    social::like_listing(&db, "bob", id).unwrap();

    assert_eq!(listings::delete_listing(&db, "bob", id).unwrap(), listings::ListingDeletion::NotOwner);
    assert_eq!(listings::delete_listing(&db, "ann", id).unwrap(), listings::ListingDeletion::Deleted);
    assert_eq!(listings::delete_listing(&db, "ann", id).unwrap(), listings::ListingDeletion::NotFound);

    assert!(feed::query_listings(&db, &ListingQuery::liked_by("bob")).unwrap().is_empty());
    assert!(listings::query_images(&db, id).unwrap().is_empty());
}

#[test]
fn deleting_an_account_cascades() {
    let (_dir, db) = setup();
    let id = insert(&db, &listing("ann", "bike", SAN_FRANCISCO, &[]));
    social::like_listing(&db, "bob", id).unwrap();
    social::rate_user(&db, "ann", "bob", 5, None).unwrap();

    assert!(accounts::delete_account(&db, "ann").unwrap());
    assert!(!accounts::delete_account(&db, "ann").unwrap());

    assert!(feed::query_listings(&db, &ListingQuery::feed(Utc::now())).unwrap().is_empty());
    assert!(social::query_reviews(&db, "bob").unwrap().is_empty());
}

#[test]
fn unknown_owner_is_not_inserted() {
    let (_dir, db) = setup();
    let result = listings::insert_listing(&db, &listing("nobody", "bike", SAN_FRANCISCO, &["x"]), &[]);

    assert_eq!(result.unwrap(), None);
    assert!(listings::query_tag_names(&db).unwrap().is_empty());
}

#[test]
fn bulk_deletes_only_touch_the_owners_listings() {
    let (_dir, db) = setup();

    let first = insert(&db, &listing("ann", "bike", SAN_FRANCISCO, &[]));
    let second = insert(&db, &listing("ann", "tent", SAN_FRANCISCO, &[]));
    let third = insert(&db, &listing("ann", "lamp", SAN_FRANCISCO, &[]));
    let bobs = insert(&db, &listing("bob", "couch", SAN_FRANCISCO, &[]));

    assert_eq!(listings::delete_listings(&db, "ann", Some(&[first, bobs])).unwrap(), 1);
    assert_eq!(listings::delete_listings(&db, "ann", Some(&[])).unwrap(), 0);

    // Spans several `IN (...)` chunks
    let mut many = (10_000..11_200).collect::<Vec<i64>>();
    many.push(second);
    assert_eq!(listings::delete_listings(&db, "ann", Some(&many)).unwrap(), 1);

    let feed = feed::query_listings(&db, &ListingQuery::feed(Utc::now())).unwrap();
    assert_eq!(titles(&feed), vec!["couch", "lamp"]);

    assert_eq!(listings::delete_listings(&db, "ann", None).unwrap(), 1);
    let feed = feed::query_listings(&db, &ListingQuery::feed(Utc::now())).unwrap();
    assert_eq!(titles(&feed), vec!["couch"]);
    assert!(feed.iter().all(|view| view.listing_id != third));
}
