use itertools::Itertools;
use rusqlite::{Connection, params_from_iter, types::Value};

use crate::{
    models,
    tpdb::{DBResult, Database, ID_CHUNK_SIZE, accounts::account_exists_in, placeholders},
};

/////*============== LISTING QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::ImageRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            image_id: row.get("ImageId")?,
            uri: row.get("ImageURI")?,
            blurhash: row.get("BlurHash")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingDeletion {
    Deleted,
    NotFound,
    NotOwner,
}

/// Trims, drops blanks and removes repeats, keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .unique()
        .map(str::to_string)
        .collect()
}

/// Inserts a listing along with its tags and images, all in one transaction.
///
/// Returns the new listing's id, or `None` if the owner has no account.
pub fn insert_listing(
    db: &Database,
    listing: &models::NewListing,
    images: &[models::StoredImage],
) -> DBResult<Option<i64>> {
    log::trace!("[insert_listing] Inserting listing '{}' for {}...", listing.title, listing.username);

    let mut connection = db.connect()?;
    let tx = connection.transaction()?;

    if !account_exists_in(&tx, &listing.username)? {
        log::trace!("[insert_listing] No account named '{}'.", listing.username);
        return Ok(None);
    }

    tx.prepare(
        "INSERT INTO Listings ( Price,  Title,  Description,  Username,  PostDate,  Latitude,
                               Longitude,  City,  Condition,  TransactionPreference,  Currency,
                               CurrencySymbol)
         VALUES              (:price, :title, :description, :username, :post_date, :latitude,
                              :longitude, :city, :condition, :transaction_preference, :currency,
                              :currency_symbol)",
    )?
    .execute(rusqlite::named_params! {
        ":price":                  listing.price,
        ":title":                  listing.title,
        ":description":            listing.description,
        ":username":               listing.username,
        ":post_date":              listing.post_date.timestamp_millis(),
        ":latitude":               listing.location.latitude,
        ":longitude":              listing.location.longitude,
        ":city":                   listing.city,
        ":condition":              listing.condition,
        ":transaction_preference": listing.transaction_preference,
        ":currency":               listing.currency,
        ":currency_symbol":        listing.currency_symbol,
    })
    .inspect_err(|err| log::error!("[insert_listing] Could not insert listing: {err}"))?;

    let listing_id = tx.last_insert_rowid();

    for (position, tag) in normalize_tags(&listing.tags).iter().enumerate() {
        let tag_id = insert_tag_if_absent(&tx, tag)?;
        tx.prepare(
            "INSERT INTO ListingTags ( ListingId,  TagId,  TagName,  Position)
             VALUES                 (:listing_id, :tag_id, :tag_name, :position)",
        )?
        .execute(rusqlite::named_params! {
            ":listing_id": listing_id,
            ":tag_id":     tag_id,
            ":tag_name":   tag,
            ":position":   position as i64,
        })?;
    }

    for (position, image) in images.iter().enumerate() {
        tx.prepare(
            "INSERT INTO Images ( ListingId,  ImageURI,  BlurHash,  Position)
             VALUES            (:listing_id, :uri, :blurhash, :position)",
        )?
        .execute(rusqlite::named_params! {
            ":listing_id": listing_id,
            ":uri":        image.uri,
            ":blurhash":   image.blurhash,
            ":position":   position as i64,
        })?;
    }

    tx.commit()?;
    log::info!("Listing {listing_id} ('{}') has been created by {}.", listing.title, listing.username);

    Ok(Some(listing_id))
}

/// Returns the id of `tag_name`, creating the tag if it doesn't exist yet.
fn insert_tag_if_absent(connection: &Connection, tag_name: &str) -> DBResult<i64> {
    connection
        .prepare("INSERT INTO Tags (TagName) VALUES (:tag_name) ON CONFLICT (TagName) DO NOTHING")?
        .execute(rusqlite::named_params! { ":tag_name": tag_name })?;

    connection
        .prepare("SELECT TagId FROM Tags WHERE TagName = :tag_name")?
        .query_row(rusqlite::named_params! { ":tag_name": tag_name }, |row| row.get("TagId"))
}

/// Deletes one listing, provided `username` owns it.
pub fn delete_listing(db: &Database, username: &str, listing_id: i64) -> DBResult<ListingDeletion> {
    let connection = db.connect()?;

    let owner: Option<String> = connection
        .prepare("SELECT Username FROM Listings WHERE ListingId = :listing_id")?
        .query(rusqlite::named_params! { ":listing_id": listing_id })?
        .next()?
        .map(|row| row.get("Username"))
        .transpose()?;

    match owner {
        None => return Ok(ListingDeletion::NotFound),
        Some(owner) if owner != username => return Ok(ListingDeletion::NotOwner),
        Some(_) => {}
    }

    let deleted = connection
        .prepare("DELETE FROM Listings WHERE ListingId = :listing_id AND Username = :username")?
        .execute(rusqlite::named_params! { ":listing_id": listing_id, ":username": username })?;

    // Lost a race with another delete
    if deleted == 0 {
        return Ok(ListingDeletion::NotFound);
    }

    log::info!("Listing {listing_id} has been deleted by {username}.");
    Ok(ListingDeletion::Deleted)
}

/// Deletes several of `username`'s listings at once, or all of them when `listing_ids`
/// is `None`. Ids that don't belong to `username` are ignored.
///
/// Returns how many listings were removed.
pub fn delete_listings(db: &Database, username: &str, listing_ids: Option<&[i64]>) -> DBResult<usize> {
    let mut connection = db.connect()?;

    let Some(ids) = listing_ids else {
        let deleted = connection
            .prepare("DELETE FROM Listings WHERE Username = :username")?
            .execute(rusqlite::named_params! { ":username": username })
            .inspect_err(|err| log::error!("[delete_listings] Could not delete listings: {err}"))?;

        log::info!("All {deleted} listing(s) of {username} have been deleted.");
        return Ok(deleted);
    };

    let tx = connection.transaction()?;
    let mut deleted = 0;

    for chunk in ids.chunks(ID_CHUNK_SIZE) {
        let sql = format!(
            "DELETE FROM Listings WHERE Username = ? AND ListingId IN ({})",
            placeholders(chunk.len())
        );
        let params = std::iter::once(Value::Text(username.to_string()))
            .chain(chunk.iter().map(|&id| Value::Integer(id)));

        deleted += tx
            .prepare(&sql)?
            .execute(params_from_iter(params))
            .inspect_err(|err| log::error!("[delete_listings] Could not delete listings: {err}"))?;
    }

    tx.commit()?;
    log::info!("{deleted} listing(s) have been deleted by {username}.");
    Ok(deleted)
}

/// Images of a listing in the order they were uploaded.
pub fn query_images(db: &Database, listing_id: i64) -> DBResult<Vec<models::ImageRecord>> {
    let connection = db.connect()?;

    let mut stmt = connection.prepare(
        "SELECT ImageId, ImageURI, BlurHash
         FROM Images
         WHERE ListingId = :listing_id
         ORDER BY Position, ImageId",
    )?;

    let images = stmt
        .query_map(rusqlite::named_params! { ":listing_id": listing_id }, |row| {
            models::ImageRecord::try_from(row)
        })?
        .collect::<DBResult<Vec<models::ImageRecord>>>()?;

    Ok(images)
}

/// Every tag name that has ever been used, alphabetically.
pub fn query_tag_names(db: &Database) -> DBResult<Vec<String>> {
    let connection = db.connect()?;
    let mut stmt = connection.prepare("SELECT TagName FROM Tags ORDER BY TagName")?;

    let tags = stmt
        .query_map([], |row| row.get("TagName"))?
        .collect::<DBResult<Vec<String>>>()?;

    Ok(tags)
}

pub(crate) fn listing_exists_in(connection: &Connection, listing_id: i64) -> DBResult<bool> {
    connection
        .prepare("SELECT 1 FROM Listings WHERE ListingId = :listing_id")?
        .exists(rusqlite::named_params! { ":listing_id": listing_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        let tags = vec![
            " bikes".to_string(),
            "outdoors".to_string(),
            "".to_string(),
            "bikes ".to_string(),
            "   ".to_string(),
        ];

        assert_eq!(normalize_tags(&tags), vec!["bikes", "outdoors"]);
    }
}
