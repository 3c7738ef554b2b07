use crate::{
    models,
    tpdb::{
        DBResult, Database, accounts,
        feed::{self, ListingQuery},
        reshape, social,
    },
};

/////*============== PROFILE QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::ProfilePictures {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            profile_picture: row.get("ProfilePicture")?,
            cover_picture: row.get("CoverPicture")?,
        })
    }
}

impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::ContactInfo {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            phone_number: row.get("PhoneNumber")?,
            instagram: row.get("Instagram")?,
            facebook: row.get("Facebook")?,
            twitter: row.get("Twitter")?,
        })
    }
}

impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::Visibility {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            show_email: row.get("ShowEmail")?,
            show_phone_number: row.get("ShowPhoneNumber")?,
            show_instagram: row.get("ShowInstagram")?,
            show_facebook: row.get("ShowFacebook")?,
            show_twitter: row.get("ShowTwitter")?,
        })
    }
}

pub fn query_profile_pictures(db: &Database, username: &str) -> DBResult<models::ProfilePictures> {
    let connection = db.connect()?;
    let pictures: Option<models::ProfilePictures> = connection
        .prepare("SELECT ProfilePicture, CoverPicture FROM Profiles WHERE Username = :username")?
        .query(rusqlite::named_params! { ":username": username })?
        .next()?
        .map(|row| row.try_into())
        .transpose()?;

    Ok(pictures.unwrap_or_default())
}

/// A profile edit. Fields left as `None` keep their stored values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileUpdate<'a> {
    pub email: Option<&'a str>,
    pub profile_picture: Option<&'a str>,
    pub cover_picture: Option<&'a str>,
}

/// Outcome of applying a [`ProfileUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileChange {
    Updated,
    EmailTaken,
}

/// Applies a profile edit in one transaction: either every field changes or none does.
pub fn update_profile(db: &Database, username: &str, update: &ProfileUpdate) -> DBResult<ProfileChange> {
    log::trace!("[update_profile] Updating profile for {username}...");

    let mut connection = db.connect()?;
    let tx = connection.transaction()?;

    if let Some(email) = update.email {
        let changed = tx
            .prepare("UPDATE Accounts SET Email = :email WHERE Username = :username")?
            .execute(rusqlite::named_params! { ":username": username, ":email": email })
            .map_or_else(crate::tpdb::swallow_constraint_violation, |_| Ok(true))?;

        if !changed {
            log::trace!("[update_profile] Email {email} already belongs to someone else.");
            return Ok(ProfileChange::EmailTaken);
        }
    }

    if update.profile_picture.is_some() || update.cover_picture.is_some() {
        tx.prepare(
            "INSERT INTO Profiles ( Username,  ProfilePicture,  CoverPicture)
             VALUES              (:username, :profile_picture, :cover_picture)
             ON CONFLICT (Username) DO UPDATE SET
                ProfilePicture = COALESCE(excluded.ProfilePicture, ProfilePicture),
                CoverPicture   = COALESCE(excluded.CoverPicture, CoverPicture)",
        )?
        .execute(rusqlite::named_params! {
            ":username":        username,
            ":profile_picture": update.profile_picture,
            ":cover_picture":   update.cover_picture,
        })
        .inspect_err(|err| log::error!("[update_profile] Could not update pictures: {err}"))?;
    }

    tx.commit()?;
    Ok(ProfileChange::Updated)
}

pub fn query_contact_info(db: &Database, username: &str) -> DBResult<models::ContactInfo> {
    let connection = db.connect()?;
    let info: Option<models::ContactInfo> = connection
        .prepare("SELECT * FROM ContactInfo WHERE Username = :username")?
        .query(rusqlite::named_params! { ":username": username })?
        .next()?
        .map(|row| row.try_into())
        .transpose()?;

    Ok(info.unwrap_or_default())
}

pub fn query_visibility(db: &Database, username: &str) -> DBResult<models::Visibility> {
    let connection = db.connect()?;
    let visibility: Option<models::Visibility> = connection
        .prepare("SELECT * FROM Settings WHERE Username = :username")?
        .query(rusqlite::named_params! { ":username": username })?
        .next()?
        .map(|row| row.try_into())
        .transpose()?;

    Ok(visibility.unwrap_or(models::DEFAULT_VISIBILITY))
}

/// Applies a partial contact info edit. Fields left out of `update` keep their values.
pub fn update_contact_info(
    db: &Database,
    username: &str,
    update: &models::ContactInfoUpdate,
) -> DBResult<()> {
    log::trace!("[update_contact_info] Updating contact info for {username}...");

    let mut connection = db.connect()?;
    let tx = connection.transaction()?;

    tx.prepare(
        "INSERT INTO ContactInfo ( Username,  PhoneNumber,  Instagram,  Facebook,  Twitter)
         VALUES                 (:username, :phone_number, :instagram, :facebook, :twitter)
         ON CONFLICT (Username) DO UPDATE SET
            PhoneNumber = COALESCE(excluded.PhoneNumber, PhoneNumber),
            Instagram   = COALESCE(excluded.Instagram, Instagram),
            Facebook    = COALESCE(excluded.Facebook, Facebook),
            Twitter     = COALESCE(excluded.Twitter, Twitter)",
    )?
    .execute(rusqlite::named_params! {
        ":username":     username,
        ":phone_number": update.phone_number,
        ":instagram":    update.instagram,
        ":facebook":     update.facebook,
        ":twitter":      update.twitter,
    })?;

    let defaults = models::DEFAULT_VISIBILITY;
    tx.prepare(
        "INSERT INTO Settings ( Username,  ShowEmail,  ShowPhoneNumber,  ShowInstagram,
                                ShowFacebook,  ShowTwitter)
         VALUES               (:username,
                               COALESCE(:show_email, :default_email),
                               COALESCE(:show_phone, :default_phone),
                               COALESCE(:show_instagram, :default_instagram),
                               COALESCE(:show_facebook, :default_facebook),
                               COALESCE(:show_twitter, :default_twitter))
         ON CONFLICT (Username) DO UPDATE SET
            ShowEmail       = COALESCE(:show_email, ShowEmail),
            ShowPhoneNumber = COALESCE(:show_phone, ShowPhoneNumber),
            ShowInstagram   = COALESCE(:show_instagram, ShowInstagram),
            ShowFacebook    = COALESCE(:show_facebook, ShowFacebook),
            ShowTwitter     = COALESCE(:show_twitter, ShowTwitter)",
    )?
    .execute(rusqlite::named_params! {
        ":username":          username,
        ":show_email":        update.show_email,
        ":show_phone":        update.show_phone_number,
        ":show_instagram":    update.show_instagram,
        ":show_facebook":     update.show_facebook,
        ":show_twitter":      update.show_twitter,
        ":default_email":     defaults.show_email,
        ":default_phone":     defaults.show_phone_number,
        ":default_instagram": defaults.show_instagram,
        ":default_facebook":  defaults.show_facebook,
        ":default_twitter":   defaults.show_twitter,
    })?;

    tx.commit()
        .inspect_err(|err| log::error!("[update_contact_info] Could not update '{username}': {err}"))?;

    log::info!("Contact info for {username} has been updated.");
    Ok(())
}

/// What a viewer gets to see of someone's contact details.
///
/// The owner sees every field along with the visibility flags; anybody else only sees
/// the fields marked visible.
pub fn contact_card(
    email: String,
    info: models::ContactInfo,
    visibility: models::Visibility,
    is_owner: bool,
) -> models::ContactCard {
    if is_owner {
        return models::ContactCard {
            email: Some(email),
            phone_number: info.phone_number,
            instagram: info.instagram,
            facebook: info.facebook,
            twitter: info.twitter,
            visibility: Some(visibility),
        };
    }

    models::ContactCard {
        email: visibility.show_email.then_some(email),
        phone_number: info.phone_number.filter(|_| visibility.show_phone_number),
        instagram: info.instagram.filter(|_| visibility.show_instagram),
        facebook: info.facebook.filter(|_| visibility.show_facebook),
        twitter: info.twitter.filter(|_| visibility.show_twitter),
        visibility: None,
    }
}

/// Everything shown on `profile_name`'s profile page, as seen by `viewer`.
///
/// Returns `None` if there is no such user.
pub fn query_profile(
    db: &Database,
    profile_name: &str,
    viewer: &str,
) -> DBResult<Option<models::ProfileView>> {
    log::trace!("[query_profile] {viewer} is viewing {profile_name}'s profile.");

    let Some(email) = accounts::query_email(db, profile_name)? else {
        return Ok(None);
    };
    let is_owner = viewer == profile_name;

    let pictures = query_profile_pictures(db, profile_name)?;
    let listings = feed::query_listings(db, &ListingQuery::owned_by(profile_name).viewed_by(Some(viewer)))?;
    let liked_listings = if is_owner {
        feed::query_listings(db, &ListingQuery::liked_by(profile_name).viewed_by(Some(viewer)))?
    } else {
        Vec::new()
    };

    let reviews = social::query_reviews(db, profile_name)?;
    let average = (!reviews.is_empty())
        .then(|| reviews.iter().map(|r| r.rating as f64).sum::<f64>() / reviews.len() as f64);
    let summary = reshape::rating_summary(average, reviews.len() as i64);

    let viewer_rating = if is_owner { None } else { social::query_rating(db, viewer, profile_name)? };

    let contact_info = contact_card(
        email,
        query_contact_info(db, profile_name)?,
        query_visibility(db, profile_name)?,
        is_owner,
    );

    Ok(Some(models::ProfileView {
        username: profile_name.to_string(),
        profile_picture: pictures.profile_picture,
        cover_picture: pictures.cover_picture,
        is_owner,
        listings,
        liked_listings,
        ratings: models::ProfileRatings {
            average_rating: summary.average_rating,
            rating_count: summary.rating_count,
            reviews,
        },
        viewer_rating,
        contact_info,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> models::ContactInfo {
        models::ContactInfo {
            phone_number: Some("555-0100".to_string()),
            instagram: Some("@ann".to_string()),
            facebook: None,
            twitter: Some("@ann_tw".to_string()),
        }
    }

    #[test]
    fn owner_sees_everything() {
        let card = contact_card("ann@example.com".into(), info(), models::DEFAULT_VISIBILITY, true);

        assert_eq!(card.email.as_deref(), Some("ann@example.com"));
        assert_eq!(card.phone_number.as_deref(), Some("555-0100"));
        assert_eq!(card.visibility, Some(models::DEFAULT_VISIBILITY));
    }

    #[test]
    fn others_see_only_visible_fields() {
        let card = contact_card("ann@example.com".into(), info(), models::DEFAULT_VISIBILITY, false);

        assert_eq!(card.email, None);
        assert_eq!(card.phone_number, None);
        assert_eq!(card.instagram.as_deref(), Some("@ann"));
        assert_eq!(card.twitter.as_deref(), Some("@ann_tw"));
        assert_eq!(card.visibility, None);

        let json = serde_json::to_value(&card).unwrap();
        assert!(json.get("email").is_none());
        assert!(json.get("phoneNumber").is_none());
    }

    fn database_with(usernames: &[&str]) -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("profiles.db"));
        db.initialize().unwrap();

        for name in usernames {
            let account = models::Account {
                username: name.to_string(),
                password: "pw".to_string(),
                email: format!("{name}@example.com"),
            };
            accounts::insert_account(&db, &account).unwrap();
        }

        (dir, db)
    }

    #[test]
    fn taken_email_leaves_the_whole_profile_untouched() {
        let (_dir, db) = database_with(&["ann", "bob"]);

        let update = ProfileUpdate {
            email: Some("bob@example.com"),
            profile_picture: Some("/uploads/me.png"),
            cover_picture: None,
        };
        assert_eq!(update_profile(&db, "ann", &update).unwrap(), ProfileChange::EmailTaken);

        assert_eq!(accounts::query_email(&db, "ann").unwrap().as_deref(), Some("ann@example.com"));
        assert_eq!(query_profile_pictures(&db, "ann").unwrap(), models::ProfilePictures::default());
    }

    #[test]
    fn partial_updates_keep_other_fields() {
        let (_dir, db) = database_with(&["ann"]);

        let pictures = ProfileUpdate {
            profile_picture: Some("/uploads/me.png"),
            cover_picture: Some("/uploads/cover.png"),
            ..Default::default()
        };
        assert_eq!(update_profile(&db, "ann", &pictures).unwrap(), ProfileChange::Updated);

        let email = ProfileUpdate { email: Some("ann@new.example.com"), ..Default::default() };
        assert_eq!(update_profile(&db, "ann", &email).unwrap(), ProfileChange::Updated);

        let stored = query_profile_pictures(&db, "ann").unwrap();
        assert_eq!(stored.profile_picture.as_deref(), Some("/uploads/me.png"));
        assert_eq!(stored.cover_picture.as_deref(), Some("/uploads/cover.png"));
        assert_eq!(accounts::query_email(&db, "ann").unwrap().as_deref(), Some("ann@new.example.com"));
    }
}
