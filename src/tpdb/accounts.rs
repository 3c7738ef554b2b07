use rusqlite::Connection;

use crate::{
    models,
    tpdb::{DBResult, Database, unique_violation},
};

/////*============== ACCOUNT QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::AccountSummary {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            username: row.get("Username")?,
            email: row.get("Email")?,
        })
    }
}

/// Outcome of trying to create an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    UsernameTaken,
    EmailTaken,
}

/// Outcome of checking a username/password pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialCheck {
    Valid,
    UnknownUser,
    WrongPassword,
}

/// Creates an account together with its empty profile and default settings.
///
/// Uniqueness of both username and email is left to the table constraints, so two
/// concurrent registrations can't both succeed.
pub fn insert_account(db: &Database, account: &models::Account) -> DBResult<Registration> {
    log::trace!("[insert_account] Inserting account {}...", account.username);

    let mut connection = db.connect()?;
    let tx = connection.transaction()?;

    let inserted = tx
        .prepare(
            "INSERT INTO Accounts ( Username,  Password,  Email)
             VALUES               (:username, :password, :email)",
        )?
        .execute(rusqlite::named_params! {
            ":username": account.username,
            ":password": account.password,
            ":email":    account.email,
        });

    if let Err(err) = inserted {
        return match unique_violation(&err) {
            Some(columns) if columns.contains("Email") => Ok(Registration::EmailTaken),
            Some(_) => Ok(Registration::UsernameTaken),
            None => Err(err),
        };
    }

    tx.execute(
        "INSERT INTO Profiles (Username) VALUES (?1)",
        [&account.username],
    )?;

    let defaults = models::DEFAULT_VISIBILITY;
    tx.prepare(
        "INSERT INTO Settings ( Username,  ShowEmail,  ShowPhoneNumber,  ShowInstagram,
                                ShowFacebook,  ShowTwitter)
         VALUES               (:username, :show_email, :show_phone, :show_instagram,
                               :show_facebook, :show_twitter)",
    )?
    .execute(rusqlite::named_params! {
        ":username":       account.username,
        ":show_email":     defaults.show_email,
        ":show_phone":     defaults.show_phone_number,
        ":show_instagram": defaults.show_instagram,
        ":show_facebook":  defaults.show_facebook,
        ":show_twitter":   defaults.show_twitter,
    })?;

    tx.commit()?;
    log::info!("Account {} has been registered.", account.username);

    Ok(Registration::Created)
}

/// Compares `password` against the stored one for `username`.
pub fn check_credentials(db: &Database, username: &str, password: &str) -> DBResult<CredentialCheck> {
    let connection = db.connect()?;
    let stored: Option<String> = connection
        .prepare("SELECT Password FROM Accounts WHERE Username = :username")?
        .query(rusqlite::named_params! { ":username": username })?
        .next()?
        .map(|row| row.get("Password"))
        .transpose()?;

    Ok(match stored {
        None => CredentialCheck::UnknownUser,
        Some(stored) if stored == password => CredentialCheck::Valid,
        Some(_) => CredentialCheck::WrongPassword,
    })
}

/// Lists every account's public fields, ordered by username.
pub fn query_accounts(db: &Database) -> DBResult<Vec<models::AccountSummary>> {
    log::trace!("[query_accounts] Querying all accounts.");
    let connection = db.connect()?;

    let mut stmt = connection.prepare("SELECT Username, Email FROM Accounts ORDER BY Username")?;
    let accounts = stmt
        .query_map([], |row| models::AccountSummary::try_from(row))?
        .collect::<DBResult<Vec<models::AccountSummary>>>()?;

    Ok(accounts)
}

/// Checks for the account on an already open connection.
pub(crate) fn account_exists_in(connection: &Connection, username: &str) -> DBResult<bool> {
    connection
        .prepare("SELECT 1 FROM Accounts WHERE Username = :username")?
        .exists(rusqlite::named_params! { ":username": username })
}

pub fn query_email(db: &Database, username: &str) -> DBResult<Option<String>> {
    let connection = db.connect()?;
    connection
        .prepare("SELECT Email FROM Accounts WHERE Username = :username")?
        .query(rusqlite::named_params! { ":username": username })?
        .next()?
        .map(|row| row.get("Email"))
        .transpose()
}

/// Deletes an account. Listings, likes, ratings, profile, contact info and settings
/// belonging to it go with it through the foreign key cascades.
///
/// Returns `false` if there was no such account.
pub fn delete_account(db: &Database, username: &str) -> DBResult<bool> {
    let connection = db.connect()?;
    let deleted = connection
        .prepare("DELETE FROM Accounts WHERE Username = :username")?
        .execute(rusqlite::named_params! { ":username": username })
        .inspect_err(|err| log::error!("[delete_account] Could not delete '{username}': {err}"))?;

    if deleted > 0 {
        log::info!("Account {username} has been deleted.");
    }

    Ok(deleted > 0)
}
