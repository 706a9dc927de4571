use std::{convert::Infallible, path::PathBuf};

use warp::{reject::Rejection, Filter};

use crate::core::participant::{Participant, ParticipantPatch};

use super::{
    handlers::{
        check_access, edit_registration, get_directory, get_letters, get_markers,
        save_registration, to_http_none_or_error, to_http_output, upload_image, CallingCodeQuery,
        CityQuery, CountryQuery, Id, RoleOptions,
    },
    Context,
};

/// Largest accepted image upload
const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub fn with_context(ctx: Context) -> impl Filter<Extract = (Context,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

fn participant_filters(
    ctx: Context,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let get_participants = warp::path!("participants")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(async |ctx: Context| to_http_output(Ok(ctx.api.get_participants().await)));

    let bulk_upsert_participants = warp::path!("participants")
        .and(warp::put())
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(async |participants: Vec<Participant>, ctx: Context| {
            to_http_none_or_error(ctx.api.bulk_upsert_participants(participants).await)
        });

    let create_participant = warp::path!("participant")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(async |participant: Participant, ctx: Context| {
            to_http_output(ctx.api.add_participant(participant).await)
        });

    let upsert_participant = warp::path!("participant")
        .and(warp::put())
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(async |participant: Participant, ctx: Context| {
            to_http_output(ctx.api.upsert_participant(participant).await)
        });

    let update_participant = warp::path!("participant" / String)
        .and(warp::patch())
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(async |id: String, patch: ParticipantPatch, ctx: Context| {
            to_http_output(ctx.api.update_participant(&id, patch).await)
        });

    let delete_participant = warp::path!("participant")
        .and(warp::delete())
        .and(warp::body::json())
        .and(with_context(ctx))
        .and_then(async |participant: Id, ctx: Context| {
            to_http_none_or_error(ctx.api.delete_participant(&participant.id).await)
        });

    get_participants
        .or(bulk_upsert_participants)
        .or(create_participant)
        .or(upsert_participant)
        .or(update_participant)
        .or(delete_participant)
}

fn settings_filters(
    ctx: Context,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let get_settings = warp::path!("settings")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(async |ctx: Context| to_http_output(Ok(ctx.api.get_settings().await)));

    let upload = warp::path!("upload" / String)
        .and(warp::post())
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::body::content_length_limit(MAX_UPLOAD_BYTES))
        .and(warp::body::bytes())
        .and(with_context(ctx))
        .and_then(upload_image);

    get_settings.or(upload)
}

fn geo_filters(
    ctx: Context,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let countries = warp::path!("geo" / "countries")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(async |ctx: Context| to_http_output(Ok(ctx.geo.countries())));

    let states = warp::path!("geo" / "states")
        .and(warp::get())
        .and(warp::query::<CountryQuery>())
        .and(with_context(ctx.clone()))
        .and_then(async |query: CountryQuery, ctx: Context| {
            to_http_output(Ok(ctx.geo.states_of(&query.country)))
        });

    let cities = warp::path!("geo" / "cities")
        .and(warp::get())
        .and(warp::query::<CityQuery>())
        .and(with_context(ctx.clone()))
        .and_then(async |query: CityQuery, ctx: Context| {
            to_http_output(Ok(ctx.geo.cities_of(&query.country, &query.state)))
        });

    let calling_codes = warp::path!("geo" / "calling-codes")
        .and(warp::get())
        .and(warp::query::<CallingCodeQuery>())
        .and(with_context(ctx))
        .and_then(async |query: CallingCodeQuery, ctx: Context| {
            to_http_output(Ok(ctx.geo.search_calling_codes(query.q.as_deref().unwrap_or(""))))
        });

    countries.or(states).or(cities).or(calling_codes)
}

fn directory_filters(
    ctx: Context,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let directory = warp::path!("directory")
        .and(warp::get())
        .and(warp::query())
        .and(with_context(ctx.clone()))
        .and_then(get_directory);

    let letters = warp::path!("directory" / "letters")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(get_letters);

    let markers = warp::path!("map" / "markers")
        .and(warp::get())
        .and(with_context(ctx))
        .and_then(get_markers);

    directory.or(letters).or(markers)
}

fn registration_filters(
    ctx: Context,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let access = warp::path!("access")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(check_access);

    let roles = warp::path!("registration" / "roles")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(async |ctx: Context| {
            to_http_output(Ok(RoleOptions {
                roles: ctx.catalog.roles(),
                caps: ctx.caps,
            }))
        });

    let edit = warp::path!("registration" / "edit")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(edit_registration);

    let save = warp::path!("registration")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_context(ctx))
        .and_then(save_registration);

    access.or(roles).or(edit).or(save)
}

/// Serves the local image bucket
pub fn storage_filters(
    bucket_dir: PathBuf,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    warp::path!("storage" / "picture" / ..)
        .and(warp::get())
        .and(warp::fs::dir(bucket_dir))
}

pub fn api_filters(
    ctx: Context,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    participant_filters(ctx.clone())
        .or(settings_filters(ctx.clone()))
        .or(geo_filters(ctx.clone()))
        .or(directory_filters(ctx.clone()))
        .or(registration_filters(ctx))
}
