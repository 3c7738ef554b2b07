pub const ACCOUNTS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Accounts (
        Username       TEXT        PRIMARY KEY,
        Password       TEXT        NOT NULL,
        Email          TEXT        NOT NULL,

        UNIQUE (Email)
    )";

pub const LISTINGS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Listings (
        ListingId              INTEGER     PRIMARY KEY AUTOINCREMENT,

        Price                  REAL        NOT NULL,
        Title                  TEXT        NOT NULL,
        Description            TEXT        NOT NULL,
        Username               TEXT        NOT NULL    REFERENCES Accounts(Username) ON DELETE CASCADE,
        PostDate               INTEGER     NOT NULL,

        Latitude               REAL        NOT NULL,
        Longitude              REAL        NOT NULL,
        City                   TEXT,

        Condition              TEXT        NOT NULL,
        TransactionPreference  TEXT        NOT NULL,
        Currency               TEXT        NOT NULL,
        CurrencySymbol         TEXT        NOT NULL
    )";

pub const TAGS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Tags (
        TagId          INTEGER     PRIMARY KEY,
        TagName        TEXT        NOT NULL,

        UNIQUE (TagName)
    )";

pub const LISTING_TAGS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS ListingTags (
        ListingId      INTEGER     NOT NULL    REFERENCES Listings(ListingId) ON DELETE CASCADE,
        TagId          INTEGER     NOT NULL    REFERENCES Tags(TagId),
        TagName        TEXT        NOT NULL,
        Position       INTEGER     NOT NULL,

        PRIMARY KEY (ListingId, TagId)
    )";

pub const IMAGES_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Images (
        ImageId        INTEGER     PRIMARY KEY,
        ListingId      INTEGER     NOT NULL    REFERENCES Listings(ListingId) ON DELETE CASCADE,
        ImageURI       TEXT        NOT NULL,
        BlurHash       TEXT        NOT NULL,
        Position       INTEGER     NOT NULL
    )";

pub const LIKES_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Likes (
        Username       TEXT        NOT NULL    REFERENCES Accounts(Username) ON DELETE CASCADE,
        ListingId      INTEGER     NOT NULL    REFERENCES Listings(ListingId) ON DELETE CASCADE,

        PRIMARY KEY (Username, ListingId)
    )";

pub const RATINGS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Ratings (
        Username           TEXT        NOT NULL    REFERENCES Accounts(Username) ON DELETE CASCADE,
        UserRated          TEXT        NOT NULL    REFERENCES Accounts(Username) ON DELETE CASCADE,
        Rating             INTEGER     NOT NULL,
        ReviewDescription  TEXT,

        UNIQUE (Username, UserRated)
    )";

pub const PROFILES_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Profiles (
        Username           TEXT        PRIMARY KEY    REFERENCES Accounts(Username) ON DELETE CASCADE,
        ProfilePicture     TEXT,
        CoverPicture       TEXT
    )";

pub const CONTACT_INFO_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS ContactInfo (
        Username       TEXT        PRIMARY KEY    REFERENCES Accounts(Username) ON DELETE CASCADE,
        PhoneNumber    TEXT,
        Instagram      TEXT,
        Facebook       TEXT,
        Twitter        TEXT
    )";

pub const SETTINGS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Settings (
        Username          TEXT        PRIMARY KEY    REFERENCES Accounts(Username) ON DELETE CASCADE,
        ShowEmail         BOOLEAN     NOT NULL,
        ShowPhoneNumber   BOOLEAN     NOT NULL,
        ShowInstagram     BOOLEAN     NOT NULL,
        ShowFacebook      BOOLEAN     NOT NULL,
        ShowTwitter       BOOLEAN     NOT NULL
    )";

pub const INDEXES: &str =
    "CREATE INDEX IF NOT EXISTS idx_listings_post_date ON Listings(PostDate);
     CREATE INDEX IF NOT EXISTS idx_listings_username ON Listings(Username);
     CREATE INDEX IF NOT EXISTS idx_listing_tags_tag_name ON ListingTags(TagName);
     CREATE INDEX IF NOT EXISTS idx_images_listing ON Images(ListingId, Position);
     CREATE INDEX IF NOT EXISTS idx_likes_listing ON Likes(ListingId);
     CREATE INDEX IF NOT EXISTS idx_ratings_user_rated ON Ratings(UserRated);";

/// Every table, in creation order.
pub const TABLES: &[(&str, &str)] = &[
    ("Accounts", ACCOUNTS_SCHEMA),
    ("Listings", LISTINGS_SCHEMA),
    ("Tags", TAGS_SCHEMA),
    ("ListingTags", LISTING_TAGS_SCHEMA),
    ("Images", IMAGES_SCHEMA),
    ("Likes", LIKES_SCHEMA),
    ("Ratings", RATINGS_SCHEMA),
    ("Profiles", PROFILES_SCHEMA),
    ("ContactInfo", CONTACT_INFO_SCHEMA),
    ("Settings", SETTINGS_SCHEMA),
];
