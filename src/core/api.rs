use std::{
    collections::HashMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use super::{
    bucket::ImageUpload,
    db::Backend,
    normalize::Completeness,
    participant::{Participant, ParticipantPatch},
};

/// Storage key for an uploaded image
pub fn object_key(timestamp_millis: u128, hint: &str) -> String {
    format!("{}-{}", timestamp_millis, hint)
}

/// The persistence client used by the rest of the application.
///
/// Reads degrade to empty results when the backend is unreachable, writes
/// always report their failure to the caller.
#[derive(Clone)]
pub struct Api {
    backend: Arc<dyn Backend>,
}

impl Api {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Api { backend }
    }

    pub async fn get_participants(&self) -> Vec<Participant> {
        match self.backend.select_participants().await {
            Ok(participants) => participants,
            Err(e) => {
                log::error!("Failed to load participants: {}", e);
                vec![]
            }
        }
    }

    pub async fn add_participant(&self, participant: Participant) -> anyhow::Result<Participant> {
        participant.validate(Completeness::Draft)?;
        self.backend
            .insert_participant(&participant.with_search_fields())
            .await
    }

    pub async fn upsert_participant(&self, participant: Participant) -> anyhow::Result<Participant> {
        participant.validate(Completeness::Draft)?;
        let stored = self
            .backend
            .upsert_participant(&participant.with_search_fields())
            .await?;
        log::info!("Saved participant {}", stored.email);
        Ok(stored)
    }

    pub async fn bulk_upsert_participants(
        &self,
        participants: Vec<Participant>,
    ) -> anyhow::Result<()> {
        let participants = participants
            .into_iter()
            .map(|p| {
                p.validate(Completeness::Draft)?;
                Ok(p.with_search_fields())
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        self.backend.upsert_participants(&participants).await?;
        log::info!("Saved {} participants", participants.len());
        Ok(())
    }

    pub async fn update_participant(
        &self,
        id: &str,
        patch: ParticipantPatch,
    ) -> anyhow::Result<Participant> {
        self.backend
            .update_participant(id, &patch.with_search_fields())
            .await
    }

    pub async fn delete_participant(&self, id: &str) -> anyhow::Result<()> {
        self.backend.delete_participant(id).await?;
        log::info!("Deleted participant {}", id);
        Ok(())
    }

    /// Settings rows as an id to value map
    pub async fn get_settings(&self) -> HashMap<String, String> {
        match self.backend.select_settings().await {
            Ok(settings) => settings.into_iter().map(|s| (s.id, s.value)).collect(),
            Err(e) => {
                log::error!("Failed to load settings: {}", e);
                HashMap::new()
            }
        }
    }

    /// Stores an image under a timestamped key and returns its public URL.
    pub async fn upload_image(&self, upload: &ImageUpload, hint: &str) -> anyhow::Result<String> {
        let millis = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
        let path = self
            .backend
            .put_object(&object_key(millis, hint), upload)
            .await?;
        Ok(self.backend.public_url(&path))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        core::{
            bucket::ImageUpload,
            db::Setting,
            memory::MemoryBackend,
            participant::{Participant, ParticipantPatch},
        },
        error::Error,
    };

    use super::{object_key, Api};

    fn participant(name: &str, email: &str) -> Participant {
        Participant {
            name: name.to_string(),
            email: email.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_object_key() {
        assert_eq!(
            object_key(1700000000000, "profile-anna@example.org"),
            "1700000000000-profile-anna@example.org"
        );
    }

    #[tokio::test]
    async fn test_reads_degrade_to_empty() {
        let backend = Arc::new(MemoryBackend::default());
        let api = Api::new(backend.clone());

        api.add_participant(participant("Anna", "anna@example.org")).await.unwrap();
        backend.settings.lock().unwrap().push(Setting {
            id: "welcome".to_string(),
            value: "Hello".to_string(),
        });
        assert_eq!(api.get_participants().await.len(), 1);
        assert_eq!(api.get_settings().await.get("welcome").map(String::as_str), Some("Hello"));

        backend.set_failing(true);
        assert!(api.get_participants().await.is_empty());
        assert!(api.get_settings().await.is_empty());
    }

    #[tokio::test]
    async fn test_writes_propagate_errors() {
        let backend = Arc::new(MemoryBackend::default());
        let api = Api::new(backend.clone());
        backend.set_failing(true);

        let upload = ImageUpload {
            content_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        };
        assert!(api.add_participant(participant("Anna", "anna@example.org")).await.is_err());
        assert!(api.upsert_participant(participant("Anna", "anna@example.org")).await.is_err());
        assert!(api.bulk_upsert_participants(vec![participant("Anna", "anna@example.org")]).await.is_err());
        assert!(api.update_participant("1", ParticipantPatch::default()).await.is_err());
        assert!(api.delete_participant("1").await.is_err());
        assert!(api.upload_image(&upload, "profile-anna@example.org").await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_derives_search_fields() {
        let backend = Arc::new(MemoryBackend::default());
        let api = Api::new(backend.clone());

        let stored = api
            .upsert_participant(Participant {
                organization: "Hope & Life e.V.".to_string(),
                ..participant("Anna Keller", "anna@example.org")
            })
            .await
            .unwrap();
        assert_eq!(stored.search_name, "ANNA KELLER");
        assert_eq!(stored.search_org, "HOPE LIFE EV");

        let updated = api
            .update_participant(
                stored.id.as_deref().unwrap(),
                ParticipantPatch {
                    name: Some("Anna Braun".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.search_name, "ANNA BRAUN");
    }

    #[tokio::test]
    async fn test_rejects_records_without_email() {
        let api = Api::new(Arc::new(MemoryBackend::default()));

        let err = api.upsert_participant(participant("Anna", "")).await.unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::MissingFields(vec!["email"])));
    }

    #[tokio::test]
    async fn test_upload_image() {
        let backend = Arc::new(MemoryBackend::default());
        let api = Api::new(backend.clone());

        let upload = ImageUpload {
            content_type: "image/jpeg".to_string(),
            bytes: vec![0xff, 0xd8],
        };
        let url = api.upload_image(&upload, "promo-anna@example.org").await.unwrap();

        let objects = backend.objects.lock().unwrap();
        let (key, stored) = &objects[0];
        assert!(key.ends_with("-promo-anna@example.org"));
        assert!(key.split('-').next().unwrap().parse::<u128>().is_ok());
        assert_eq!(stored, &upload);
        assert_eq!(url, format!("https://cdn.example.org/picture/{}", key));
    }
}
