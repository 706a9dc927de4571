use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use anyhow::anyhow;
use async_trait::async_trait;

use crate::error::Error;

use super::{
    bucket::ImageUpload,
    db::{Backend, Setting},
    participant::{Participant, ParticipantPatch},
};

/// Backend double keeping everything in memory. Any operation fails while
/// `failing` is set.
#[derive(Default)]
pub struct MemoryBackend {
    pub participants: Mutex<Vec<Participant>>,
    pub settings: Mutex<Vec<Setting>>,
    pub objects: Mutex<Vec<(String, ImageUpload)>>,
    pub failing: AtomicBool,
    next_id: Mutex<u64>,
}

impl MemoryBackend {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("backend unavailable"));
        }
        Ok(())
    }

    fn store(&self, participant: &Participant, replace: bool) -> anyhow::Result<Participant> {
        let mut participants = self.participants.lock().unwrap();
        let mut stored = participant.clone();

        if let Some(existing) = participants.iter_mut().find(|p| p.email == participant.email) {
            if !replace {
                return Err(anyhow!("duplicate key value violates unique constraint"));
            }
            stored.id = existing.id.clone();
            stored.created_at = existing.created_at.clone();
            *existing = stored.clone();
            return Ok(stored);
        }

        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        stored.id = Some(next_id.to_string());
        stored.created_at = Some("2026-01-01T00:00:00.000Z".to_string());
        participants.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select_participants(&self) -> anyhow::Result<Vec<Participant>> {
        self.check()?;
        let mut all = self.participants.lock().unwrap().clone();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn insert_participant(&self, participant: &Participant) -> anyhow::Result<Participant> {
        self.check()?;
        self.store(participant, false)
    }

    async fn upsert_participant(&self, participant: &Participant) -> anyhow::Result<Participant> {
        self.check()?;
        self.store(participant, true)
    }

    async fn upsert_participants(&self, participants: &[Participant]) -> anyhow::Result<()> {
        self.check()?;
        for participant in participants {
            self.store(participant, true)?;
        }
        Ok(())
    }

    async fn update_participant(
        &self,
        id: &str,
        patch: &ParticipantPatch,
    ) -> anyhow::Result<Participant> {
        self.check()?;
        let mut participants = self.participants.lock().unwrap();
        let participant = participants
            .iter_mut()
            .find(|p| p.id.as_deref() == Some(id))
            .ok_or_else(|| Error::ParticipantNotFound(id.to_string()))?;
        patch.apply_to(participant);
        Ok(participant.clone())
    }

    async fn delete_participant(&self, id: &str) -> anyhow::Result<()> {
        self.check()?;
        let mut participants = self.participants.lock().unwrap();
        let before = participants.len();
        participants.retain(|p| p.id.as_deref() != Some(id));
        if participants.len() == before {
            return Err(Error::ParticipantNotFound(id.to_string()).into());
        }
        Ok(())
    }

    async fn select_settings(&self) -> anyhow::Result<Vec<Setting>> {
        self.check()?;
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn put_object(&self, key: &str, upload: &ImageUpload) -> anyhow::Result<String> {
        self.check()?;
        self.objects
            .lock()
            .unwrap()
            .push((key.to_string(), upload.clone()));
        Ok(format!("picture/{}", key))
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://cdn.example.org/{}", path)
    }
}
