use std::convert::Infallible;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use warp::{http::StatusCode, hyper::body::Bytes, Reply};

use crate::{
    core::{
        bucket::ImageUpload,
        directory::{display_photo, filter_city, letter_groups, map_markers, search},
        geo::{City, GeoCountry, State},
        normalize::Completeness,
        participant::Participant,
        registration::{Edit, Registration},
        roles::{CategoryCount, RoleCaps, RoleOption},
    },
    error::Error,
};

use super::Context;

/// A Json struct to store a participant ID
#[derive(Serialize, Deserialize, Debug)]
pub struct Id {
    pub id: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CountryQuery {
    pub country: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CityQuery {
    pub country: String,
    pub state: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CallingCodeQuery {
    pub q: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct DirectoryQuery {
    pub q: Option<String>,
    pub city: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AccessRequest {
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AccessResponse {
    pub authorized: bool,
}

/// A Json struct to apply edits to a registration
#[derive(Serialize, Deserialize, Debug)]
pub struct EditRequest {
    pub registration: Registration,
    pub edits: Vec<Edit>,
}

/// A Json struct to save a registration as a draft or final submission
#[derive(Serialize, Deserialize, Debug)]
pub struct SaveRequest {
    pub registration: Registration,
    pub mode: Completeness,
}

/// A registration together with what the form shows for its current step
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationView<'a> {
    pub registration: &'a Registration,
    pub step_number: u8,
    pub missing_fields: Vec<&'static str>,
    pub role_counts: Vec<CategoryCount>,
    pub selectable_roles: Vec<&'a str>,
    pub states: &'a [State],
    pub cities: &'a [City],
    pub calling_codes: Vec<&'a GeoCountry>,
}

#[derive(Serialize, Debug)]
pub struct RoleOptions<'a> {
    pub roles: &'a [RoleOption],
    pub caps: RoleCaps,
}

/// A directory listing entry, with the placeholder filled in for missing photos
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry<'a> {
    #[serde(flatten)]
    pub participant: &'a Participant,
    pub display_photo: String,
    pub events_text: Option<String>,
}

fn error_status(e: &anyhow::Error) -> StatusCode {
    match e.downcast_ref::<Error>() {
        Some(Error::ParticipantNotFound(_)) => StatusCode::NOT_FOUND,
        Some(_) => StatusCode::BAD_REQUEST,
        None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn to_http_none_or_error(result: anyhow::Result<()>) -> Result<impl warp::Reply, Infallible> {
    match result {
        Ok(_) => Ok(warp::reply::with_status(
            "Success".to_string(),
            StatusCode::OK,
        )),
        Err(e) => {
            log::warn!("{}", e);
            Ok(warp::reply::with_status(e.to_string(), error_status(&e)))
        }
    }
}

/// Serializes `result` as a JSON reply, or replies with the error message as text.
pub fn to_http_output<T: Serialize>(
    result: anyhow::Result<T>,
) -> Result<warp::reply::Response, Infallible> {
    let reply = match result.and_then(|data| Ok(serde_json::to_string::<T>(&data)?)) {
        Ok(json) => warp::reply::with_header(
            warp::reply::with_status(json, StatusCode::OK),
            "content-type",
            "application/json",
        )
        .into_response(),
        Err(e) => {
            log::warn!("{}", e);
            warp::reply::with_status(e.to_string(), error_status(&e)).into_response()
        }
    };

    Ok(reply)
}

pub async fn get_directory(
    query: DirectoryQuery,
    ctx: Context,
) -> Result<impl warp::Reply, Infallible> {
    let participants = ctx.api.get_participants().await;

    let mut matches = search(&participants, query.q.as_deref().unwrap_or(""));
    if let Some(city) = query.city.as_deref().filter(|c| !c.trim().is_empty()) {
        matches = filter_city(matches, city);
    }

    let entries: Vec<DirectoryEntry> = matches
        .into_iter()
        .map(|participant| DirectoryEntry {
            participant,
            display_photo: display_photo(participant),
            events_text: participant.upcoming_events_text(),
        })
        .collect();
    to_http_output(Ok(entries))
}

pub async fn get_letters(ctx: Context) -> Result<impl warp::Reply, Infallible> {
    let participants = ctx.api.get_participants().await;
    to_http_output(Ok(letter_groups(&participants)))
}

pub async fn get_markers(ctx: Context) -> Result<impl warp::Reply, Infallible> {
    let participants = ctx.api.get_participants().await;
    to_http_output(Ok(map_markers(&participants, ctx.geo)))
}

pub async fn upload_image(
    hint: String,
    content_type: Option<String>,
    bytes: Bytes,
    ctx: Context,
) -> Result<impl warp::Reply, Infallible> {
    let upload = ImageUpload {
        content_type: content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
        bytes: bytes.to_vec(),
    };
    let hint = percent_decode_str(&hint).decode_utf8_lossy();
    to_http_output(ctx.api.upload_image(&upload, &hint).await)
}

pub async fn check_access(
    request: AccessRequest,
    ctx: Context,
) -> Result<impl warp::Reply, Infallible> {
    let authorized = ctx.gate.verify(&request.code);
    if !authorized {
        log::warn!("Rejected access code");
    }
    to_http_output(Ok(AccessResponse { authorized }))
}

pub async fn edit_registration(
    request: EditRequest,
    ctx: Context,
) -> Result<impl warp::Reply, Infallible> {
    let reg_ctx = ctx.registration_context();
    let result = request
        .registration
        .apply_edits(&reg_ctx, &request.edits)
        .map_err(anyhow::Error::from)
        .and_then(|registration| {
            let view = RegistrationView {
                registration: &registration,
                step_number: registration.step.number(),
                missing_fields: registration.missing_fields(ctx.geo),
                role_counts: registration.role_counts(&reg_ctx),
                selectable_roles: ctx
                    .catalog
                    .roles()
                    .iter()
                    .filter(|role| registration.is_role_selectable(&reg_ctx, &role.label))
                    .map(|role| role.label.as_str())
                    .collect(),
                states: registration.available_states(ctx.geo),
                cities: registration.available_cities(ctx.geo),
                calling_codes: registration.calling_code_options(ctx.geo),
            };
            Ok(serde_json::to_value(&view)?)
        });
    to_http_output(result)
}

pub async fn save_registration(
    request: SaveRequest,
    ctx: Context,
) -> Result<impl warp::Reply, Infallible> {
    let saved = request
        .registration
        .save(ctx.geo, &ctx.api, request.mode)
        .await;
    to_http_output(Ok(saved))
}
