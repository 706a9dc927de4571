use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::{
    geo::GeoData,
    participant::{Country, Participant, SocialAccount},
};

/// Informal country names mapped to their ISO code.
pub const COUNTRY_SYNONYMS: &[(&str, &str)] = &[
    ("great britain", "GB"),
    ("uk", "GB"),
    ("usa", "US"),
    ("united states of america", "US"),
    ("uae", "AE"),
    ("holland", "NL"),
    ("brasil", "BR"),
];

static EMAIL: OnceLock<Regex> = OnceLock::new();

fn email_pattern() -> &'static Regex {
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email pattern"))
}

/// How complete a record must be to pass validation
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    /// Work in progress, only the upsert key is required
    Draft,
    /// A finished registration
    Final,
}

/// Registration input before normalization
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RawParticipant {
    pub name: String,
    pub email: String,
    pub title: String,
    pub organization: String,
    pub org_description: String,
    pub country: Option<Country>,
    pub state: String,
    pub city: String,
    pub nationality: Option<Country>,
    pub short_bio: String,
    pub testimony: String,
    pub phone: String,
    pub is_whatsapp: bool,
    pub website: String,
    pub social_media: Vec<SocialAccount>,
    pub photo_url: String,
    pub promo_photo_url: String,
    pub other_info: String,
    pub upcoming_events: String,
    pub contact_email: String,
    pub dietary_restrictions: String,
}

/// Resolves a country by ISO code or name, case-insensitively.
///
/// Synonyms such as "uk" or "holland" are consulted first.
pub fn find_country(geo: &GeoData, value: &str) -> Option<Country> {
    let needle = value.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let code = COUNTRY_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == needle)
        .map(|(_, code)| code.to_lowercase())
        .unwrap_or_else(|| needle.clone());

    geo.countries()
        .iter()
        .find(|c| c.iso_code.to_lowercase() == code || c.name.to_lowercase() == needle)
        .map(|c| c.as_country())
        .or_else(|| {
            geo.nationalities()
                .iter()
                .find(|c| c.code.to_lowercase() == code || c.name.to_lowercase() == needle)
                .cloned()
        })
}

/// Uppercased search form of a name.
///
/// Letters keep their diacritics. Hyphens become spaces, other punctuation
/// is dropped and runs of whitespace collapse to one space.
pub fn search_key(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c.is_whitespace() || c == '-' {
                Some(' ')
            } else {
                None
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Prepends the calling code of `calling_iso` to a national number with its
/// leading zeros removed. The number is otherwise kept as typed.
pub fn compose_phone(geo: &GeoData, calling_iso: &str, national: &str) -> String {
    if national.is_empty() {
        return String::new();
    }

    format!(
        "{}{}",
        geo.calling_code(calling_iso).unwrap_or(""),
        national.trim_start_matches('0')
    )
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Builds the canonical record from raw input and validates it.
pub fn process_participant(raw: RawParticipant, level: Completeness) -> Result<Participant, Error> {
    let name = raw.name.trim().to_string();
    let organization = raw.organization.trim().to_string();

    let participant = Participant {
        id: None,
        name,
        email: raw.email.trim().to_string(),
        title: raw.title,
        organization,
        org_description: non_blank(raw.org_description),
        country: raw.country,
        state: non_blank(raw.state),
        city: non_blank(raw.city),
        nationality: raw.nationality,
        short_bio: non_blank(raw.short_bio),
        testimony: raw.testimony,
        phone: raw.phone,
        is_whatsapp: Some(raw.is_whatsapp),
        website: raw.website,
        social_media: raw.social_media,
        photo_url: raw.photo_url,
        promo_photo_url: non_blank(raw.promo_photo_url),
        other_info: non_blank(raw.other_info),
        events: None,
        upcoming_events: non_blank(raw.upcoming_events),
        contact_email: non_blank(raw.contact_email),
        dietary_restrictions: non_blank(raw.dietary_restrictions),
        search_name: String::new(),
        search_org: String::new(),
        created_at: None,
    }
    .with_search_fields();

    participant.validate(level)?;
    Ok(participant)
}

impl Participant {
    /// Checks the record against the storage schema for the given level.
    pub fn validate(&self, level: Completeness) -> Result<(), Error> {
        fn blank(value: &str) -> bool {
            value.trim().is_empty()
        }

        fn blank_opt(value: &Option<String>) -> bool {
            value.as_deref().map(blank).unwrap_or(true)
        }

        let mut missing = vec![];
        if blank(&self.email) {
            missing.push("email");
        }

        if level == Completeness::Final {
            let checks = [
                ("name", blank(&self.name)),
                ("organization", blank(&self.organization)),
                ("shortBio", blank_opt(&self.short_bio)),
                ("testimony", blank(&self.testimony)),
                ("dietaryRestrictions", blank_opt(&self.dietary_restrictions)),
                ("country", self.country.is_none()),
                ("nationality", self.nationality.is_none()),
                ("photoUrl", blank(&self.photo_url)),
            ];
            missing.extend(checks.iter().filter(|(_, m)| *m).map(|(field, _)| *field));
        }

        if !missing.is_empty() {
            return Err(Error::MissingFields(missing));
        }

        if !email_pattern().is_match(self.email.trim()) {
            return Err(Error::InvalidEmail(self.email.clone()));
        }

        Ok(())
    }
}
