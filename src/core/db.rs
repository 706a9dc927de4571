use std::path::PathBuf;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{
    migrate::MigrateDatabase,
    query::QueryAs,
    sqlite::{Sqlite, SqliteArguments},
    types::Json,
    FromRow, SqlitePool,
};

use crate::error::Error;

use super::{
    bucket::{ImageBucket, ImageUpload},
    participant::{Country, Participant, ParticipantPatch, SocialAccount},
};

/// A row of the key/value settings table
#[derive(Serialize, Deserialize, FromRow, PartialEq, Eq, Debug, Clone)]
pub struct Setting {
    pub id: String,
    pub value: String,
}

/// Raw storage operations behind the persistence client.
#[async_trait]
pub trait Backend: Send + Sync {
    /// All participants ordered by name
    async fn select_participants(&self) -> anyhow::Result<Vec<Participant>>;

    async fn insert_participant(&self, participant: &Participant) -> anyhow::Result<Participant>;

    /// Insert or fully replace the record with the same email
    async fn upsert_participant(&self, participant: &Participant) -> anyhow::Result<Participant>;

    async fn upsert_participants(&self, participants: &[Participant]) -> anyhow::Result<()>;

    async fn update_participant(
        &self,
        id: &str,
        patch: &ParticipantPatch,
    ) -> anyhow::Result<Participant>;

    async fn delete_participant(&self, id: &str) -> anyhow::Result<()>;

    async fn select_settings(&self) -> anyhow::Result<Vec<Setting>>;

    /// Stores an image and returns its storage path
    async fn put_object(&self, key: &str, upload: &ImageUpload) -> anyhow::Result<String>;

    fn public_url(&self, path: &str) -> String;
}

/// Columns written on insert, upsert and update
const WRITE_COLUMNS: &[&str] = &[
    "email",
    "name",
    "title",
    "organization",
    "org_description",
    "country",
    "state",
    "city",
    "nationality",
    "short_bio",
    "testimony",
    "phone",
    "is_whatsapp",
    "website",
    "social_media",
    "photo_url",
    "promo_photo_url",
    "other_info",
    "events",
    "upcoming_events",
    "contact_email",
    "dietary_restrictions",
    "search_name",
    "search_org",
];

fn insert_sql(upsert: bool) -> String {
    let mut sql = format!(
        "insert into participants({}) values({})",
        WRITE_COLUMNS.join(", "),
        vec!["?"; WRITE_COLUMNS.len()].join(", ")
    );

    if upsert {
        let updates: Vec<String> = WRITE_COLUMNS
            .iter()
            .filter(|c| **c != "email")
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        sql.push_str(" on conflict(email) do update set ");
        sql.push_str(&updates.join(", "));
    }

    sql.push_str(" returning *");
    sql
}

fn update_sql() -> String {
    let sets: Vec<String> = WRITE_COLUMNS.iter().map(|c| format!("{c} = ?")).collect();
    format!(
        "update participants set {} where id = ? returning *",
        sets.join(", ")
    )
}

fn parse_id(id: &str) -> Result<i64, Error> {
    id.trim()
        .parse()
        .map_err(|_| Error::InvalidId(id.to_string()))
}

type ParticipantQuery<'q> = QueryAs<'q, Sqlite, ParticipantRow, SqliteArguments<'q>>;

fn bind_participant<'q>(query: ParticipantQuery<'q>, p: &'q Participant) -> ParticipantQuery<'q> {
    query
        .bind(&p.email)
        .bind(&p.name)
        .bind(&p.title)
        .bind(&p.organization)
        .bind(&p.org_description)
        .bind(p.country.as_ref().map(Json))
        .bind(&p.state)
        .bind(&p.city)
        .bind(p.nationality.as_ref().map(Json))
        .bind(&p.short_bio)
        .bind(&p.testimony)
        .bind(&p.phone)
        .bind(p.is_whatsapp)
        .bind(&p.website)
        .bind(Json(&p.social_media))
        .bind(&p.photo_url)
        .bind(&p.promo_photo_url)
        .bind(&p.other_info)
        .bind(p.events.as_ref().map(Json))
        .bind(&p.upcoming_events)
        .bind(&p.contact_email)
        .bind(&p.dietary_restrictions)
        .bind(&p.search_name)
        .bind(&p.search_org)
}

#[derive(FromRow)]
struct ParticipantRow {
    id: i64,
    email: String,
    name: String,
    title: String,
    organization: String,
    org_description: Option<String>,
    country: Option<Json<Country>>,
    state: Option<String>,
    city: Option<String>,
    nationality: Option<Json<Country>>,
    short_bio: Option<String>,
    testimony: String,
    phone: String,
    is_whatsapp: Option<bool>,
    website: String,
    social_media: Json<Vec<SocialAccount>>,
    photo_url: String,
    promo_photo_url: Option<String>,
    other_info: Option<String>,
    events: Option<Json<Vec<String>>>,
    upcoming_events: Option<String>,
    contact_email: Option<String>,
    dietary_restrictions: Option<String>,
    search_name: String,
    search_org: String,
    created_at: String,
}

impl From<ParticipantRow> for Participant {
    fn from(row: ParticipantRow) -> Self {
        Participant {
            id: Some(row.id.to_string()),
            name: row.name,
            title: row.title,
            organization: row.organization,
            org_description: row.org_description,
            country: row.country.map(|c| c.0),
            state: row.state,
            city: row.city,
            nationality: row.nationality.map(|c| c.0),
            short_bio: row.short_bio,
            testimony: row.testimony,
            phone: row.phone,
            is_whatsapp: row.is_whatsapp,
            email: row.email,
            website: row.website,
            social_media: row.social_media.0,
            photo_url: row.photo_url,
            promo_photo_url: row.promo_photo_url,
            other_info: row.other_info,
            events: row.events.map(|e| e.0),
            upcoming_events: row.upcoming_events,
            contact_email: row.contact_email,
            dietary_restrictions: row.dietary_restrictions,
            search_name: row.search_name,
            search_org: row.search_org,
            created_at: Some(row.created_at),
        }
    }
}

/// The local SQLite backend with its image bucket
pub struct DirectoryDb {
    db: SqlitePool,
    bucket: ImageBucket,
}

impl DirectoryDb {
    /// Opens the database file, creating it and its tables if needed.
    pub async fn init(file: &PathBuf, bucket: ImageBucket) -> anyhow::Result<Self> {
        let path = file
            .to_str()
            .ok_or_else(|| anyhow!("Invalid database path {}", file.display()))?;
        let url = format!("sqlite://{}", path);
        if !Sqlite::database_exists(&url).await? {
            log::info!("Creating database {}", path);
            Sqlite::create_database(&url).await?;
        }

        let db = SqlitePool::connect(&url).await?;
        Self::create_tables(&db).await?;
        Ok(DirectoryDb { db, bucket })
    }

    #[cfg(test)]
    pub async fn in_memory(bucket: ImageBucket) -> anyhow::Result<Self> {
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::create_tables(&db).await?;
        Ok(DirectoryDb { db, bucket })
    }

    async fn create_tables(db: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query(
            "create table if not exists participants(
                    id integer primary key autoincrement,
                    email text not null unique,
                    name text not null,
                    title text not null default '',
                    organization text not null default '',
                    org_description text,
                    country text,
                    state text,
                    city text,
                    nationality text,
                    short_bio text,
                    testimony text not null default '',
                    phone text not null default '',
                    is_whatsapp boolean,
                    website text not null default '',
                    social_media text not null default '[]',
                    photo_url text not null default '',
                    promo_photo_url text,
                    other_info text,
                    events text,
                    upcoming_events text,
                    contact_email text,
                    dietary_restrictions text,
                    search_name text not null default '',
                    search_org text not null default '',
                    created_at text not null default (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                );",
        )
        .execute(db)
        .await?;

        sqlx::query(
            "create table if not exists settings(
                    id text primary key not null,
                    value text not null
                );",
        )
        .execute(db)
        .await?;

        Ok(())
    }

    pub async fn set_setting(&self, id: &str, value: &str) -> anyhow::Result<()> {
        log::debug!("Setting {} to {}", id, value);
        sqlx::query(
            "insert into settings(id, value) values(?, ?)
                on conflict(id) do update set value = excluded.value",
        )
        .bind(id)
        .bind(value)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for DirectoryDb {
    async fn select_participants(&self) -> anyhow::Result<Vec<Participant>> {
        let rows: Vec<ParticipantRow> =
            sqlx::query_as("select * from participants order by name asc")
                .fetch_all(&self.db)
                .await?;
        Ok(rows.into_iter().map(Participant::from).collect())
    }

    async fn insert_participant(&self, participant: &Participant) -> anyhow::Result<Participant> {
        log::debug!("Adding participant {}", participant.email);
        let sql = insert_sql(false);
        let row = bind_participant(sqlx::query_as(&sql), participant)
            .fetch_one(&self.db)
            .await?;
        Ok(row.into())
    }

    async fn upsert_participant(&self, participant: &Participant) -> anyhow::Result<Participant> {
        log::debug!("Upserting participant {}", participant.email);
        let sql = insert_sql(true);
        let row = bind_participant(sqlx::query_as(&sql), participant)
            .fetch_one(&self.db)
            .await?;
        Ok(row.into())
    }

    async fn upsert_participants(&self, participants: &[Participant]) -> anyhow::Result<()> {
        log::debug!("Upserting {} participants", participants.len());
        let sql = insert_sql(true);
        let mut tx = self.db.begin().await?;
        for participant in participants {
            bind_participant(sqlx::query_as(&sql), participant)
                .fetch_one(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update_participant(
        &self,
        id: &str,
        patch: &ParticipantPatch,
    ) -> anyhow::Result<Participant> {
        let row_id = parse_id(id)?;
        let mut tx = self.db.begin().await?;

        let row: Option<ParticipantRow> = sqlx::query_as("select * from participants where id = ?")
            .bind(row_id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut participant: Participant = row
            .ok_or_else(|| Error::ParticipantNotFound(id.to_string()))?
            .into();

        patch.apply_to(&mut participant);

        let sql = update_sql();
        let row = bind_participant(sqlx::query_as(&sql), &participant)
            .bind(row_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        log::debug!("Updated participant {}", id);
        Ok(row.into())
    }

    async fn delete_participant(&self, id: &str) -> anyhow::Result<()> {
        let row_id = parse_id(id)?;
        let result = sqlx::query("delete from participants where id = ?")
            .bind(row_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::ParticipantNotFound(id.to_string()).into());
        }
        log::debug!("Deleted participant {}", id);
        Ok(())
    }

    async fn select_settings(&self) -> anyhow::Result<Vec<Setting>> {
        Ok(sqlx::query_as("select id, value from settings")
            .fetch_all(&self.db)
            .await?)
    }

    async fn put_object(&self, key: &str, upload: &ImageUpload) -> anyhow::Result<String> {
        self.bucket.put(key, &upload.bytes).await
    }

    fn public_url(&self, path: &str) -> String {
        self.bucket.public_url(path)
    }
}
