use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use url::Url;

use crate::{
    core::{
        bucket::ImageUpload,
        db::{Backend, Setting},
        participant::{Participant, ParticipantPatch},
    },
    error::Error,
};

const PARTICIPANTS: &str = "participants";
const SETTINGS: &str = "settings";
const BUCKET: &str = "picture";

/// Hosted backend speaking the PostgREST and storage APIs of a Supabase project
pub struct RestBackend {
    client: Client,
    base: Url,
    api_key: String,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: &str) -> anyhow::Result<Self> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("Invalid backend URL {}", base_url));
        }

        Ok(RestBackend {
            client: Client::new(),
            base,
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> anyhow::Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid backend URL {}", self.base))?
            .pop_if_empty()
            .extend(segments);

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    pub fn table_url(&self, table: &str, query: &[(&str, &str)]) -> anyhow::Result<Url> {
        self.url(&["rest", "v1", table], query)
    }

    pub fn object_url(&self, key: &str) -> anyhow::Result<Url> {
        self.url(&["storage", "v1", "object", BUCKET, key], &[])
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Turns an error status into an error carrying the response body.
    async fn check(response: Response) -> anyhow::Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(anyhow!("Backend request failed with {}: {}", status, body))
    }

    async fn first(response: Response, id: &str) -> anyhow::Result<Participant> {
        let mut rows: Vec<Participant> = Self::check(response).await?.json().await?;
        if rows.is_empty() {
            return Err(Error::ParticipantNotFound(id.to_string()).into());
        }
        Ok(rows.swap_remove(0))
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn select_participants(&self) -> anyhow::Result<Vec<Participant>> {
        let url = self.table_url(PARTICIPANTS, &[("select", "*"), ("order", "name.asc")])?;
        let response = self.authed(self.client.get(url)).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn insert_participant(&self, participant: &Participant) -> anyhow::Result<Participant> {
        let url = self.table_url(PARTICIPANTS, &[])?;
        let response = self
            .authed(self.client.post(url))
            .header("Prefer", "return=representation")
            .json(&[participant])
            .send()
            .await?;
        Self::first(response, &participant.email).await
    }

    async fn upsert_participant(&self, participant: &Participant) -> anyhow::Result<Participant> {
        let url = self.table_url(PARTICIPANTS, &[("on_conflict", "email")])?;
        let response = self
            .authed(self.client.post(url))
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&[participant])
            .send()
            .await?;
        Self::first(response, &participant.email).await
    }

    async fn upsert_participants(&self, participants: &[Participant]) -> anyhow::Result<()> {
        let url = self.table_url(PARTICIPANTS, &[("on_conflict", "email")])?;
        let response = self
            .authed(self.client.post(url))
            .header("Prefer", "resolution=merge-duplicates")
            .json(participants)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update_participant(
        &self,
        id: &str,
        patch: &ParticipantPatch,
    ) -> anyhow::Result<Participant> {
        let filter = format!("eq.{}", id);
        let url = self.table_url(PARTICIPANTS, &[("id", filter.as_str())])?;
        let response = self
            .authed(self.client.patch(url))
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await?;
        Self::first(response, id).await
    }

    async fn delete_participant(&self, id: &str) -> anyhow::Result<()> {
        let filter = format!("eq.{}", id);
        let url = self.table_url(PARTICIPANTS, &[("id", filter.as_str())])?;
        let response = self.authed(self.client.delete(url)).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn select_settings(&self) -> anyhow::Result<Vec<Setting>> {
        let url = self.table_url(SETTINGS, &[("select", "*")])?;
        let response = self.authed(self.client.get(url)).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn put_object(&self, key: &str, upload: &ImageUpload) -> anyhow::Result<String> {
        let response = self
            .authed(self.client.post(self.object_url(key)?))
            .header(header::CONTENT_TYPE, &upload.content_type)
            .header(header::CACHE_CONTROL, "max-age=3600")
            .header("x-upsert", "false")
            .body(upload.bytes.clone())
            .send()
            .await?;
        Self::check(response).await?;

        log::debug!("Uploaded {} ({} bytes)", key, upload.bytes.len());
        Ok(key.to_string())
    }

    fn public_url(&self, path: &str) -> String {
        match self.url(&["storage", "v1", "object", "public", BUCKET, path], &[]) {
            Ok(url) => url.to_string(),
            Err(e) => {
                log::error!("Failed to build public URL for {}: {}", path, e);
                String::new()
            }
        }
    }
}
