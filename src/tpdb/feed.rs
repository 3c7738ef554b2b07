//! The listing feed: dynamic query assembly, aggregation, and reshaping.
//!
//! Every listing endpoint goes through [`query_listings`]. The base query yields one row
//! per listing with the owner's profile picture, the viewer's like and the owner's
//! rating aggregates; tags and images are then fetched for the returned ids with an
//! explicit order and attached by [`reshape`](crate::tpdb::reshape).

use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use rusqlite::{Connection, params_from_iter, types::Value};

use std::collections::HashMap;

use crate::{
    geo::{self, Coordinates},
    models,
    tpdb::{DBResult, Database, ID_CHUNK_SIZE, placeholders, reshape},
};

/// Optional narrowing of a listing query. Empty lists mean "no filter".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilter {
    pub tags: Vec<String>,
    pub conditions: Vec<String>,
    pub transactions: Vec<String>,
    pub currency: Option<String>,
    pub distance: Option<DistanceFilter>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceFilter {
    pub origin: Coordinates,
    pub max_miles: f64,
}

impl DistanceFilter {
    /// `None` when `max_miles` is at or past the "unlimited" sentinel.
    pub fn new(origin: Coordinates, max_miles: f64) -> Option<Self> {
        geo::is_limited(max_miles).then_some(Self { origin, max_miles })
    }
}

/// Which listings a query draws from.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// Everything posted within the freshness window ending at `now`.
    Feed { now: DateTime<Utc> },
    OwnedBy(String),
    LikedBy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: Option<u32>, size: Option<u32>) -> Self {
        Self {
            number: number.unwrap_or(0),
            size: size.unwrap_or(models::DEFAULT_PAGE_SIZE).clamp(1, models::MAX_PAGE_SIZE),
        }
    }

    fn offset(&self) -> i64 {
        i64::from(self.number) * i64::from(self.size)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub scope: Scope,
    /// Whose likes fill in the `liked` flag.
    pub viewer: Option<String>,
    pub filter: ListingFilter,
    pub page: Option<Page>,
}

impl ListingQuery {
    pub fn feed(now: DateTime<Utc>) -> Self {
        Self::with_scope(Scope::Feed { now })
    }

    pub fn owned_by(username: &str) -> Self {
        Self::with_scope(Scope::OwnedBy(username.to_string()))
    }

    pub fn liked_by(username: &str) -> Self {
        Self::with_scope(Scope::LikedBy(username.to_string()))
    }

    fn with_scope(scope: Scope) -> Self {
        Self { scope, viewer: None, filter: ListingFilter::default(), page: None }
    }

    pub fn viewed_by(mut self, viewer: Option<&str>) -> Self {
        self.viewer = viewer.map(str::to_string);
        self
    }

    pub fn filtered(mut self, filter: ListingFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn paged(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }
}

/// A conjunction of SQL predicates and the values bound to their placeholders, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clauses {
    pub predicates: Vec<String>,
    pub params: Vec<Value>,
}

impl Clauses {
    fn push(&mut self, predicate: impl Into<String>, params: impl IntoIterator<Item = Value>) {
        self.predicates.push(predicate.into());
        self.params.extend(params);
    }

    fn push_in(&mut self, expression: &str, values: &[String]) {
        let values = non_blank(values);
        if values.is_empty() {
            return;
        }

        self.push(
            format!("{expression} IN ({})", placeholders(values.len())),
            values.into_iter().map(|v| Value::Text(v.to_string())),
        );
    }
}

fn non_blank(values: &[String]) -> Vec<&str> {
    values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()).collect()
}

fn distance_expression() -> String {
    format!("{}(?, ?, l.Latitude, l.Longitude)", geo::SQL_DISTANCE_FN)
}

fn origin_params(origin: Coordinates) -> [Value; 2] {
    [Value::Real(origin.latitude), Value::Real(origin.longitude)]
}

/// Builds the predicates for the optional filters.
pub fn filter_clauses(filter: &ListingFilter) -> Clauses {
    let mut clauses = Clauses::default();

    let tags = non_blank(&filter.tags);
    if !tags.is_empty() {
        clauses.push(
            format!(
                "EXISTS (SELECT 1 FROM ListingTags ft
                         WHERE ft.ListingId = l.ListingId AND ft.TagName IN ({}))",
                placeholders(tags.len())
            ),
            tags.into_iter().map(|t| Value::Text(t.to_string())),
        );
    }

    clauses.push_in("l.Condition", &filter.conditions);
    clauses.push_in("l.TransactionPreference", &filter.transactions);

    if let Some(currency) = filter.currency.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        clauses.push("l.Currency = ?", [Value::Text(currency.to_string())]);
    }

    if let Some(distance) = filter.distance {
        let mut params = origin_params(distance.origin).to_vec();
        params.push(Value::Real(distance.max_miles));
        clauses.push(format!("{} <= ?", distance_expression()), params);
    }

    clauses
}

/// Builds the predicate that restricts a query to its scope.
pub fn scope_clauses(scope: &Scope) -> Clauses {
    let mut clauses = Clauses::default();

    match scope {
        Scope::Feed { now } => {
            let cutoff = *now - TimeDelta::days(models::FRESHNESS_WINDOW_DAYS);
            clauses.push("l.PostDate >= ?", [Value::Integer(cutoff.timestamp_millis())]);
        }
        Scope::OwnedBy(username) => {
            clauses.push("l.Username = ?", [Value::Text(username.clone())]);
        }
        Scope::LikedBy(username) => {
            clauses.push(
                "EXISTS (SELECT 1 FROM Likes lb WHERE lb.ListingId = l.ListingId AND lb.Username = ?)",
                [Value::Text(username.clone())],
            );
        }
    }

    clauses
}

/// Assembles the full aggregation query and its parameters.
pub fn build_sql(query: &ListingQuery) -> (String, Vec<Value>) {
    let mut params: Vec<Value> = Vec::new();

    let liked = match &query.viewer {
        Some(viewer) => {
            params.push(Value::Text(viewer.clone()));
            "EXISTS (SELECT 1 FROM Likes lk WHERE lk.ListingId = l.ListingId AND lk.Username = ? LIMIT 1)"
        }
        None => "0",
    };

    // The distance column is only evaluated when someone asked for it
    let distance = match query.filter.distance {
        Some(filter) => {
            params.extend(origin_params(filter.origin));
            distance_expression()
        }
        None => String::from("NULL"),
    };

    let mut sql = format!(
        "SELECT l.ListingId, l.Price, l.Title, l.Description, l.Username, l.PostDate,
                l.Latitude, l.Longitude, l.City, l.Condition, l.TransactionPreference,
                l.Currency, l.CurrencySymbol,
                p.ProfilePicture,
                {liked} AS Liked,
                (SELECT AVG(r.Rating) FROM Ratings r WHERE r.UserRated = l.Username) AS AverageRating,
                (SELECT COUNT(*) FROM Ratings r WHERE r.UserRated = l.Username) AS RatingCount,
                {distance} AS Distance
         FROM Listings l
         LEFT JOIN Profiles p ON p.Username = l.Username"
    );

    let mut clauses = scope_clauses(&query.scope);
    let filters = filter_clauses(&query.filter);
    clauses.predicates.extend(filters.predicates);
    clauses.params.extend(filters.params);

    if !clauses.predicates.is_empty() {
        sql.push_str("\n         WHERE ");
        sql.push_str(&clauses.predicates.join("\n           AND "));
    }
    params.extend(clauses.params);

    sql.push_str("\n         ORDER BY l.ListingId DESC");

    if let Some(page) = query.page {
        sql.push_str(" LIMIT ? OFFSET ?");
        params.push(Value::Integer(i64::from(page.size)));
        params.push(Value::Integer(page.offset()));
    }

    (sql, params)
}

impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::ListingRow {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            listing_id: row.get("ListingId")?,
            price: row.get("Price")?,
            title: row.get("Title")?,
            description: row.get("Description")?,
            username: row.get("Username")?,
            post_date: row.get("PostDate")?,
            latitude: row.get("Latitude")?,
            longitude: row.get("Longitude")?,
            city: row.get("City")?,
            condition: row.get("Condition")?,
            transaction_preference: row.get("TransactionPreference")?,
            currency: row.get("Currency")?,
            currency_symbol: row.get("CurrencySymbol")?,

            profile_picture: row.get("ProfilePicture")?,
            liked: row.get("Liked")?,
            average_rating: row.get("AverageRating")?,
            rating_count: row.get("RatingCount")?,

            distance: row.get("Distance")?,
        })
    }
}

/// Runs a listing query and returns fully shaped listings, newest first.
pub fn query_listings(db: &Database, query: &ListingQuery) -> DBResult<Vec<models::ListingView>> {
    log::trace!("[query_listings] Running {:?} query for viewer {:?}.", query.scope, query.viewer);
    let connection = db.connect()?;

    let (sql, params) = build_sql(query);
    let rows = connection
        .prepare(&sql)?
        .query_map(params_from_iter(params.iter()), |row| models::ListingRow::try_from(row))?
        .collect::<DBResult<Vec<models::ListingRow>>>()
        .inspect_err(|err| log::error!("[query_listings] Listing query failed: {err}"))?;

    let ids = rows.iter().map(|row| row.listing_id).collect::<Vec<_>>();
    let tags = query_tags_for(&connection, &ids)?;
    let images = query_images_for(&connection, &ids)?;

    Ok(reshape::reshape_listings(rows, tags, images))
}

/// Tags of each listing in `ids`, in the order they were attached.
fn query_tags_for(connection: &Connection, ids: &[i64]) -> DBResult<HashMap<i64, Vec<String>>> {
    let mut tags = Vec::new();

    for chunk in ids.chunks(ID_CHUNK_SIZE) {
        let mut stmt = connection.prepare(&format!(
            "SELECT ListingId, TagName
             FROM ListingTags
             WHERE ListingId IN ({})
             ORDER BY ListingId, Position",
            placeholders(chunk.len())
        ))?;

        tags.extend(
            stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((row.get::<_, i64>("ListingId")?, row.get::<_, String>("TagName")?))
            })?
            .collect::<DBResult<Vec<_>>>()?,
        );
    }

    Ok(tags.into_iter().into_group_map())
}

/// Images of each listing in `ids`, each URI still paired with its own blurhash.
fn query_images_for(
    connection: &Connection,
    ids: &[i64],
) -> DBResult<HashMap<i64, Vec<models::ListingImage>>> {
    let mut images = Vec::new();

    for chunk in ids.chunks(ID_CHUNK_SIZE) {
        let mut stmt = connection.prepare(&format!(
            "SELECT ListingId, ImageURI, BlurHash
             FROM Images
             WHERE ListingId IN ({})
             ORDER BY ListingId, Position, ImageId",
            placeholders(chunk.len())
        ))?;

        images.extend(
            stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((
                    row.get::<_, i64>("ListingId")?,
                    models::ListingImage { uri: row.get("ImageURI")?, blurhash: row.get("BlurHash")? },
                ))
            })?
            .collect::<DBResult<Vec<_>>>()?,
        );
    }

    Ok(images.into_iter().into_group_map())
}
