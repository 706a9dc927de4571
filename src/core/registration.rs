use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::{
    api::Api,
    bucket::ImageUpload,
    geo::{City, GeoCountry, GeoData, State},
    normalize::{compose_phone, find_country, process_participant, Completeness, RawParticipant},
    participant::{Participant, SocialAccount, SocialKind},
    roles::{CategoryCount, RoleCaps, RoleCatalog, RoleSelection},
};

const DEFAULT_PHONE_COUNTRY: &str = "DE";
const DEFAULT_PLATFORM: &str = "instagram";
const WEBSITE_PLATFORM: &str = "website";

/// Stands in for the URL of an image that is not uploaded yet
const PENDING_UPLOAD: &str = "pending-upload";

#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Identity,
    Ministry,
    Contact,
    Testimony,
}

impl Step {
    pub fn number(&self) -> u8 {
        match self {
            Step::Identity => 1,
            Step::Ministry => 2,
            Step::Contact => 3,
            Step::Testimony => 4,
        }
    }

    pub fn next(&self) -> Step {
        match self {
            Step::Identity => Step::Ministry,
            Step::Ministry => Step::Contact,
            Step::Contact | Step::Testimony => Step::Testimony,
        }
    }

    pub fn back(&self) -> Step {
        match self {
            Step::Identity | Step::Ministry => Step::Identity,
            Step::Contact => Step::Ministry,
            Step::Testimony => Step::Contact,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Saving,
    Submitting,
    Success,
    Error(String),
}

/// Raw registration input as typed by the attendee
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationForm {
    // Identity
    pub email: String,
    pub full_name: String,
    /// ISO code of the country of residence
    pub resident_country: String,
    /// ISO code of the state, resolved to its name on save
    pub state: String,
    pub city: String,
    pub nationality: String,
    pub short_bio: String,

    // Ministry
    pub profile_picture: Option<ImageUpload>,
    pub ministry_name: String,
    pub ministry_description: String,
    pub promo_picture: Option<ImageUpload>,

    // Contact
    pub phone_country_code: String,
    pub phone_code_query: String,
    pub phone: String,
    pub is_whatsapp: bool,
    pub contact_email: String,
    pub other_contact: String,

    // Testimony
    pub testimony: String,
    pub upcoming_events: String,
    pub dietary_restrictions: String,
}

impl Default for RegistrationForm {
    fn default() -> Self {
        RegistrationForm {
            email: String::new(),
            full_name: String::new(),
            resident_country: String::new(),
            state: String::new(),
            city: String::new(),
            nationality: String::new(),
            short_bio: String::new(),
            profile_picture: None,
            ministry_name: String::new(),
            ministry_description: String::new(),
            promo_picture: None,
            phone_country_code: DEFAULT_PHONE_COUNTRY.to_string(),
            phone_code_query: String::new(),
            phone: String::new(),
            is_whatsapp: false,
            contact_email: String::new(),
            other_contact: String::new(),
            testimony: String::new(),
            upcoming_events: String::new(),
            dietary_restrictions: String::new(),
        }
    }
}

/// Free-text fields without side effects on other fields
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Email,
    FullName,
    City,
    Nationality,
    ShortBio,
    MinistryName,
    MinistryDescription,
    Phone,
    ContactEmail,
    OtherContact,
    Testimony,
    UpcomingEvents,
    DietaryRestrictions,
}

impl RegistrationForm {
    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Email => &mut self.email,
            Field::FullName => &mut self.full_name,
            Field::City => &mut self.city,
            Field::Nationality => &mut self.nationality,
            Field::ShortBio => &mut self.short_bio,
            Field::MinistryName => &mut self.ministry_name,
            Field::MinistryDescription => &mut self.ministry_description,
            Field::Phone => &mut self.phone,
            Field::ContactEmail => &mut self.contact_email,
            Field::OtherContact => &mut self.other_contact,
            Field::Testimony => &mut self.testimony,
            Field::UpcomingEvents => &mut self.upcoming_events,
            Field::DietaryRestrictions => &mut self.dietary_restrictions,
        }
    }
}

/// A single change to a registration
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(tag = "edit", content = "args", rename_all = "camelCase")]
pub enum Edit {
    Set(Field, String),
    /// Also clears state and city
    SelectResidentCountry(String),
    /// Also clears city
    SelectState(String),
    ToggleWhatsapp,
    ToggleRole(String),
    AddSocialAccount,
    RemoveSocialAccount(usize),
    /// Also clears the handle
    SetSocialPlatform(usize, String),
    SetSocialHandle(usize, String),
    SetSocialKind(usize, SocialKind),
    /// Text typed into the calling code box. An exact `+code` selects its country.
    TypeCallingCode(String),
    PickCallingCode(String),
    AttachProfilePicture(ImageUpload),
    AttachPromoPicture(ImageUpload),
    Next,
    Back,
}

/// Reference data an edit is checked against
#[derive(Clone, Copy)]
pub struct RegistrationContext<'a> {
    pub geo: &'a GeoData,
    pub catalog: &'a RoleCatalog,
    pub caps: &'a RoleCaps,
}

/// The complete state of one multi-step registration.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub step: Step,

    #[serde(default)]
    pub form: RegistrationForm,

    #[serde(default)]
    pub roles: RoleSelection,

    #[serde(default)]
    pub social_accounts: Vec<SocialAccount>,

    #[serde(default)]
    pub status: Status,

    /// Set after a successful draft save until the next edit
    #[serde(default)]
    pub draft_saved: bool,
}

impl Registration {
    pub fn new() -> Self {
        Registration::default()
    }

    pub fn apply_edits(&self, ctx: &RegistrationContext, edits: &[Edit]) -> Result<Registration, Error> {
        let mut new_reg = self.clone();
        for edit in edits {
            new_reg = new_reg.apply_edit(ctx, edit)?;
        }
        Ok(new_reg)
    }

    pub fn apply_edit(&self, ctx: &RegistrationContext, edit: &Edit) -> Result<Registration, Error> {
        if self.status == Status::Success {
            return Err(Error::RegistrationClosed);
        }

        let mut new_reg = self.clone();
        new_reg.draft_saved = false;

        match edit {
            Edit::Set(field, value) => {
                *new_reg.form.field_mut(*field) = value.clone();
            }
            Edit::SelectResidentCountry(code) => {
                new_reg.form.resident_country = code.clone();
                new_reg.form.state.clear();
                new_reg.form.city.clear();
            }
            Edit::SelectState(code) => {
                new_reg.form.state = code.clone();
                new_reg.form.city.clear();
            }
            Edit::ToggleWhatsapp => {
                new_reg.form.is_whatsapp = !self.form.is_whatsapp;
            }
            Edit::ToggleRole(label) => {
                new_reg.roles = self.roles.toggle(ctx.catalog, ctx.caps, label)?;
            }
            Edit::AddSocialAccount => {
                new_reg.social_accounts.push(SocialAccount {
                    platform: DEFAULT_PLATFORM.to_string(),
                    handle: String::new(),
                    kind: SocialKind::Personal,
                });
            }
            Edit::RemoveSocialAccount(index) => {
                if *index >= self.social_accounts.len() {
                    return Err(Error::UnknownSocialAccount(*index));
                }
                new_reg.social_accounts.remove(*index);
            }
            Edit::SetSocialPlatform(index, platform) => {
                let account = new_reg.social_account_mut(*index)?;
                account.platform = platform.clone();
                account.handle.clear();
            }
            Edit::SetSocialHandle(index, handle) => {
                new_reg.social_account_mut(*index)?.handle = handle.clone();
            }
            Edit::SetSocialKind(index, kind) => {
                new_reg.social_account_mut(*index)?.kind = *kind;
            }
            Edit::TypeCallingCode(text) => {
                new_reg.form.phone_code_query = text.clone();
                if let Some(iso) = ctx.geo.detect_calling_code(text) {
                    new_reg.form.phone_country_code = iso.to_string();
                }
            }
            Edit::PickCallingCode(iso) => {
                let country = ctx
                    .geo
                    .country(iso)
                    .ok_or_else(|| Error::UnknownCountry(iso.clone()))?;
                new_reg.form.phone_country_code = country.iso_code.clone();
                new_reg.form.phone_code_query.clear();
            }
            Edit::AttachProfilePicture(upload) => {
                new_reg.form.profile_picture = Some(upload.clone());
            }
            Edit::AttachPromoPicture(upload) => {
                new_reg.form.promo_picture = Some(upload.clone());
            }
            Edit::Next => new_reg.step = self.step.next(),
            Edit::Back => new_reg.step = self.step.back(),
        }

        Ok(new_reg)
    }

    fn social_account_mut(&mut self, index: usize) -> Result<&mut SocialAccount, Error> {
        self.social_accounts
            .get_mut(index)
            .ok_or(Error::UnknownSocialAccount(index))
    }

    pub fn available_states<'g>(&self, geo: &'g GeoData) -> &'g [State] {
        geo.states_of(&self.form.resident_country)
    }

    pub fn available_cities<'g>(&self, geo: &'g GeoData) -> &'g [City] {
        geo.cities_of(&self.form.resident_country, &self.form.state)
    }

    pub fn calling_code_options<'g>(&self, geo: &'g GeoData) -> Vec<&'g GeoCountry> {
        geo.search_calling_codes(&self.form.phone_code_query)
    }

    pub fn role_counts(&self, ctx: &RegistrationContext) -> Vec<CategoryCount> {
        self.roles.counts(ctx.catalog, ctx.caps)
    }

    pub fn is_role_selectable(&self, ctx: &RegistrationContext, label: &str) -> bool {
        self.roles.is_selectable(ctx.catalog, ctx.caps, label)
    }

    /// Required inputs still empty on the current step
    pub fn missing_fields(&self, geo: &GeoData) -> Vec<&'static str> {
        fn blank(value: &str) -> bool {
            value.trim().is_empty()
        }

        let form = &self.form;

        let checks: Vec<(&'static str, bool)> = match self.step {
            Step::Identity => vec![
                ("email", blank(&form.email)),
                ("fullName", blank(&form.full_name)),
                ("residentCountry", blank(&form.resident_country)),
                (
                    "state",
                    !self.available_states(geo).is_empty() && blank(&form.state),
                ),
                (
                    "city",
                    !self.available_cities(geo).is_empty() && blank(&form.city),
                ),
                ("nationality", blank(&form.nationality)),
                ("shortBio", blank(&form.short_bio)),
            ],
            Step::Ministry => vec![
                ("ministryName", blank(&form.ministry_name)),
                ("profilePicture", form.profile_picture.is_none()),
            ],
            Step::Contact => vec![],
            Step::Testimony => vec![
                ("testimony", blank(&form.testimony)),
                ("dietaryRestrictions", blank(&form.dietary_restrictions)),
            ],
        };

        checks
            .into_iter()
            .filter(|(_, missing)| *missing)
            .map(|(field, _)| field)
            .collect()
    }

    /// Assembles the normalizer input from the form and the uploaded image URLs.
    pub fn to_raw(&self, geo: &GeoData, photo_url: String, promo_photo_url: String) -> RawParticipant {
        let form = &self.form;
        let state = geo
            .state_name(&form.resident_country, &form.state)
            .map(str::to_string)
            .unwrap_or_else(|| form.state.clone());
        let website = self
            .social_accounts
            .iter()
            .find(|s| s.platform == WEBSITE_PLATFORM)
            .map(|s| s.handle.clone())
            .unwrap_or_default();

        RawParticipant {
            name: form.full_name.clone(),
            email: form.email.clone(),
            title: self.roles.title(),
            organization: form.ministry_name.clone(),
            org_description: form.ministry_description.clone(),
            country: find_country(geo, &form.resident_country),
            state,
            city: form.city.clone(),
            nationality: find_country(geo, &form.nationality),
            short_bio: form.short_bio.clone(),
            testimony: form.testimony.clone(),
            phone: compose_phone(geo, &form.phone_country_code, &form.phone),
            is_whatsapp: form.is_whatsapp,
            website,
            social_media: self.social_accounts.clone(),
            photo_url,
            promo_photo_url,
            other_info: form.other_contact.clone(),
            upcoming_events: form.upcoming_events.clone(),
            contact_email: form.contact_email.clone(),
            dietary_restrictions: form.dietary_restrictions.clone(),
        }
    }

    /// The in-flight state shown while a save runs
    pub fn begin_save(&self, mode: Completeness) -> Registration {
        let mut pending = self.clone();
        pending.draft_saved = false;
        pending.status = match mode {
            Completeness::Draft => Status::Saving,
            Completeness::Final => Status::Submitting,
        };
        pending
    }

    /// Validates the form, uploads the attached images, then stores the
    /// normalized participant.
    ///
    /// A draft save returns to `Idle` with `draft_saved` set, a final submit
    /// ends in `Success`. On failure every input is kept and the status
    /// carries the error message.
    pub async fn save(&self, geo: &GeoData, api: &Api, mode: Completeness) -> Registration {
        if self.status == Status::Success {
            return self.clone();
        }

        let mut new_reg = self.begin_save(mode);
        match new_reg.persist(geo, api, mode).await {
            Ok(participant) => {
                log::info!("Registration of {} saved as {:?}", participant.email, mode);
                match mode {
                    Completeness::Draft => {
                        new_reg.status = Status::Idle;
                        new_reg.draft_saved = true;
                    }
                    Completeness::Final => new_reg.status = Status::Success,
                }
            }
            Err(e) => {
                log::error!("Failed to save registration of {}: {}", self.form.email, e);
                new_reg.status = Status::Error(e.to_string());
            }
        }
        new_reg
    }

    async fn persist(&self, geo: &GeoData, api: &Api, mode: Completeness) -> anyhow::Result<Participant> {
        let email = self.form.email.trim();

        // nothing is uploaded for a record that would be rejected
        let attached = |upload: &Option<ImageUpload>| match upload {
            Some(_) => PENDING_UPLOAD.to_string(),
            None => String::new(),
        };
        process_participant(
            self.to_raw(geo, attached(&self.form.profile_picture), attached(&self.form.promo_picture)),
            mode,
        )?;

        let photo_url = match &self.form.profile_picture {
            Some(upload) => api.upload_image(upload, &format!("profile-{}", email)).await?,
            None => String::new(),
        };
        let promo_photo_url = match &self.form.promo_picture {
            Some(upload) => api.upload_image(upload, &format!("promo-{}", email)).await?,
            None => String::new(),
        };

        let participant = process_participant(self.to_raw(geo, photo_url, promo_photo_url), mode)?;
        api.upsert_participant(participant).await
    }
}
