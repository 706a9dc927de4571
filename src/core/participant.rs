use serde::{Deserialize, Serialize};

use super::normalize::search_key;

/// A country as stored on a participant record
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct Country {
    pub name: String,
    pub code: String,
    pub flag: String,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SocialKind {
    #[default]
    Personal,
    Ministerial,
}

/// One entry of a participant's social media list
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct SocialAccount {
    pub platform: String,
    pub handle: String,

    #[serde(rename = "type", default)]
    pub kind: SocialKind,
}

/// A struct representing a registered attendee, in its canonical storage form
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Backend-assigned ID, absent until first stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name
    pub name: String,

    /// Comma-joined role labels
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub organization: String,
    pub org_description: Option<String>,

    /// Country of residence
    pub country: Option<Country>,
    pub state: Option<String>,
    pub city: Option<String>,

    /// Country of origin
    pub nationality: Option<Country>,

    pub short_bio: Option<String>,

    #[serde(default)]
    pub testimony: String,

    /// Calling code followed by the national number
    #[serde(default)]
    pub phone: String,
    pub is_whatsapp: Option<bool>,

    /// Unique key for upserts
    pub email: String,

    #[serde(default)]
    pub website: String,

    #[serde(default)]
    pub social_media: Vec<SocialAccount>,

    #[serde(default)]
    pub photo_url: String,
    pub promo_photo_url: Option<String>,

    pub other_info: Option<String>,

    /// Legacy sync field, superseded by `upcoming_events`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<String>>,
    pub upcoming_events: Option<String>,

    pub contact_email: Option<String>,
    pub dietary_restrictions: Option<String>,

    /// Uppercased name used for A-Z grouping and search
    #[serde(default)]
    pub search_name: String,

    /// Uppercased organization used for search
    #[serde(default)]
    pub search_org: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Participant {
    /// Recomputes the derived search fields from the name and organization.
    pub fn with_search_fields(mut self) -> Self {
        self.search_name = search_key(&self.name);
        self.search_org = search_key(&self.organization);
        self
    }

    /// Upcoming events, falling back to the legacy `events` list for older records.
    pub fn upcoming_events_text(&self) -> Option<String> {
        match &self.upcoming_events {
            Some(text) if !text.trim().is_empty() => Some(text.clone()),
            _ => self
                .events
                .as_ref()
                .filter(|events| !events.is_empty())
                .map(|events| events.join(", ")),
        }
    }
}

/// A partial participant update. Unset fields are left untouched.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<Country>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<Country>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub testimony: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_whatsapp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_media: Option<Vec<SocialAccount>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upcoming_events: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dietary_restrictions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_org: Option<String>,
}

impl ParticipantPatch {
    /// Fills in the derived search fields for any changed name or organization.
    pub fn with_search_fields(mut self) -> Self {
        if let Some(name) = &self.name {
            self.search_name = Some(search_key(name));
        }
        if let Some(org) = &self.organization {
            self.search_org = Some(search_key(org));
        }
        self
    }

    pub fn apply_to(&self, p: &mut Participant) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        set(&mut p.name, &self.name);
        set(&mut p.title, &self.title);
        set(&mut p.organization, &self.organization);
        set_opt(&mut p.org_description, &self.org_description);
        set_opt(&mut p.country, &self.country);
        set_opt(&mut p.state, &self.state);
        set_opt(&mut p.city, &self.city);
        set_opt(&mut p.nationality, &self.nationality);
        set_opt(&mut p.short_bio, &self.short_bio);
        set(&mut p.testimony, &self.testimony);
        set(&mut p.phone, &self.phone);
        set_opt(&mut p.is_whatsapp, &self.is_whatsapp);
        set(&mut p.email, &self.email);
        set(&mut p.website, &self.website);
        set(&mut p.social_media, &self.social_media);
        set(&mut p.photo_url, &self.photo_url);
        set_opt(&mut p.promo_photo_url, &self.promo_photo_url);
        set_opt(&mut p.other_info, &self.other_info);
        set_opt(&mut p.upcoming_events, &self.upcoming_events);
        set_opt(&mut p.contact_email, &self.contact_email);
        set_opt(&mut p.dietary_restrictions, &self.dietary_restrictions);
        set(&mut p.search_name, &self.search_name);
        set(&mut p.search_org, &self.search_org);
    }
}

#[cfg(test)]
mod tests {
    use super::{Participant, ParticipantPatch, SocialAccount, SocialKind};

    #[test]
    fn test_wire_format() {
        let json = r#"{
            "id": "7",
            "name": "Anna Keller",
            "email": "anna@example.org",
            "photoUrl": "https://cdn.example.org/a.png",
            "isWhatsapp": true,
            "socialMedia": [{"platform": "instagram", "handle": "@anna", "type": "ministerial"}],
            "searchName": "ANNA KELLER"
        }"#;

        let p: Participant = serde_json::from_str(json).unwrap();
        assert_eq!(p.id.as_deref(), Some("7"));
        assert_eq!(p.is_whatsapp, Some(true));
        assert_eq!(
            p.social_media,
            vec![SocialAccount {
                platform: "instagram".to_string(),
                handle: "@anna".to_string(),
                kind: SocialKind::Ministerial
            }]
        );
        assert!(p.country.is_none());
        assert_eq!(p.testimony, "");

        let out = serde_json::to_value(&p).unwrap();
        assert_eq!(out["photoUrl"], "https://cdn.example.org/a.png");
        assert_eq!(out["socialMedia"][0]["type"], "ministerial");
        assert!(out.get("events").is_none());
    }

    #[test]
    fn test_legacy_events() {
        let mut p = Participant {
            events: Some(vec!["Berlin 2024".to_string(), "Paris 2025".to_string()]),
            ..Default::default()
        };
        assert_eq!(p.upcoming_events_text().as_deref(), Some("Berlin 2024, Paris 2025"));

        p.upcoming_events = Some("Leaders summit, July".to_string());
        assert_eq!(p.upcoming_events_text().as_deref(), Some("Leaders summit, July"));

        p.upcoming_events = Some("  ".to_string());
        p.events = None;
        assert_eq!(p.upcoming_events_text(), None);
    }

    #[test]
    fn test_patch() {
        let mut p = Participant {
            name: "Anna Keller".to_string(),
            email: "anna@example.org".to_string(),
            organization: "Old Org".to_string(),
            city: Some("Köln".to_string()),
            ..Default::default()
        };

        let patch = ParticipantPatch {
            name: Some("Anna Keller-Braun".to_string()),
            city: Some("Bonn".to_string()),
            ..Default::default()
        }
        .with_search_fields();

        patch.apply_to(&mut p);
        assert_eq!(p.name, "Anna Keller-Braun");
        assert_eq!(p.search_name, "ANNA KELLER BRAUN");
        assert_eq!(p.city.as_deref(), Some("Bonn"));
        assert_eq!(p.organization, "Old Org");
        assert_eq!(p.email, "anna@example.org");

        let wire = serde_json::to_value(&patch).unwrap();
        assert_eq!(wire.as_object().unwrap().len(), 3);
    }
}
