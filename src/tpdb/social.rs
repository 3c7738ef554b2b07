use crate::{
    models,
    tpdb::{DBResult, Database, accounts::account_exists_in, listings::listing_exists_in},
};

/////*============== LIKE & RATING QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::Review {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            username: row.get("Username")?,
            rating: row.get("Rating")?,
            review_description: row.get("ReviewDescription")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeChange {
    Added,
    AlreadyLiked,
    UnknownUser,
    UnknownListing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingChange {
    Saved,
    UnknownUser,
}

/// Records that `username` likes `listing_id`. Liking twice leaves a single like.
pub fn like_listing(db: &Database, username: &str, listing_id: i64) -> DBResult<LikeChange> {
    log::trace!("[like_listing] {username} likes listing {listing_id}.");
    let connection = db.connect()?;

    if !account_exists_in(&connection, username)? {
        return Ok(LikeChange::UnknownUser);
    }
    if !listing_exists_in(&connection, listing_id)? {
        return Ok(LikeChange::UnknownListing);
    }

    let added = connection
        .prepare("INSERT INTO Likes (Username, ListingId) VALUES (:username, :listing_id)")?
        .execute(rusqlite::named_params! { ":username": username, ":listing_id": listing_id })
        .map_or_else(crate::tpdb::swallow_constraint_violation, |_| Ok(true))?;

    Ok(if added { LikeChange::Added } else { LikeChange::AlreadyLiked })
}

/// Removes a like. Returns `false` if there was nothing to remove.
pub fn unlike_listing(db: &Database, username: &str, listing_id: i64) -> DBResult<bool> {
    log::trace!("[unlike_listing] {username} unlikes listing {listing_id}.");
    let connection = db.connect()?;

    let removed = connection
        .prepare("DELETE FROM Likes WHERE Username = :username AND ListingId = :listing_id")?
        .execute(rusqlite::named_params! { ":username": username, ":listing_id": listing_id })?;

    Ok(removed > 0)
}

/// Stores `rater`'s rating of `rated`, replacing any earlier rating between the two.
pub fn rate_user(
    db: &Database,
    rater: &str,
    rated: &str,
    rating: i64,
    review: Option<&str>,
) -> DBResult<RatingChange> {
    log::trace!("[rate_user] {rater} rates {rated} {rating}.");
    let connection = db.connect()?;

    if !account_exists_in(&connection, rater)? || !account_exists_in(&connection, rated)? {
        return Ok(RatingChange::UnknownUser);
    }

    connection
        .prepare(
            "INSERT INTO Ratings ( Username,  UserRated,  Rating,  ReviewDescription)
             VALUES             (:rater,    :rated,     :rating, :review)
             ON CONFLICT (Username, UserRated) DO UPDATE SET
                Rating = excluded.Rating,
                ReviewDescription = excluded.ReviewDescription",
        )?
        .execute(rusqlite::named_params! {
            ":rater":  rater,
            ":rated":  rated,
            ":rating": rating,
            ":review": review,
        })
        .inspect_err(|err| log::error!("[rate_user] Could not store rating: {err}"))?;

    Ok(RatingChange::Saved)
}

/// Removes `rater`'s rating of `rated`. Returns `false` if there was none.
pub fn delete_rating(db: &Database, rater: &str, rated: &str) -> DBResult<bool> {
    let connection = db.connect()?;
    let removed = connection
        .prepare("DELETE FROM Ratings WHERE Username = :rater AND UserRated = :rated")?
        .execute(rusqlite::named_params! { ":rater": rater, ":rated": rated })?;

    Ok(removed > 0)
}

/// Every rating `username` has received, most recent first.
pub fn query_reviews(db: &Database, username: &str) -> DBResult<Vec<models::Review>> {
    let connection = db.connect()?;
    let mut stmt = connection.prepare(
        "SELECT Username, Rating, ReviewDescription
         FROM Ratings
         WHERE UserRated = :username
         ORDER BY rowid DESC",
    )?;

    let reviews = stmt
        .query_map(rusqlite::named_params! { ":username": username }, |row| {
            models::Review::try_from(row)
        })?
        .collect::<DBResult<Vec<models::Review>>>()?;

    Ok(reviews)
}

/// The rating `rater` gave `rated`, if any.
pub fn query_rating(db: &Database, rater: &str, rated: &str) -> DBResult<Option<i64>> {
    let connection = db.connect()?;
    connection
        .prepare("SELECT Rating FROM Ratings WHERE Username = :rater AND UserRated = :rated")?
        .query(rusqlite::named_params! { ":rater": rater, ":rated": rated })?
        .next()?
        .map(|row| row.get("Rating"))
        .transpose()
}
