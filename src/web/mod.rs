use std::{convert::Infallible, path::PathBuf, sync::Arc};

use filters::{api_filters, storage_filters};
use warp::{http::Method, reject::Rejection, Filter};

use crate::core::{
    api::Api,
    gate::AccessGate,
    geo::GeoData,
    registration::RegistrationContext,
    roles::{RoleCaps, RoleCatalog},
};

pub mod filters;
pub mod handlers;

/// Everything a request handler needs
pub struct AppContext {
    pub api: Api,
    pub geo: &'static GeoData,
    pub catalog: RoleCatalog,
    pub caps: RoleCaps,
    pub gate: AccessGate,
}

pub type Context = Arc<AppContext>;

impl AppContext {
    pub fn registration_context(&self) -> RegistrationContext<'_> {
        RegistrationContext {
            geo: self.geo,
            catalog: &self.catalog,
            caps: &self.caps,
        }
    }
}

async fn handle_rejection(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, msg) = if err.is_not_found() {
        (warp::http::StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if let Some(err) = err.find::<warp::filters::body::BodyDeserializeError>() {
        log::error!("{}", err);
        (warp::http::StatusCode::BAD_REQUEST, err.to_string())
    } else if let Some(err) = err.find::<warp::reject::MethodNotAllowed>() {
        log::error!("Method Not Allowed: {}", err);
        (warp::http::StatusCode::METHOD_NOT_ALLOWED, err.to_string())
    } else if let Some(err) = err.find::<warp::reject::InvalidQuery>() {
        log::error!("Invalid Query: {}", err);
        (warp::http::StatusCode::BAD_REQUEST, err.to_string())
    } else if let Some(err) = err.find::<warp::reject::PayloadTooLarge>() {
        log::error!("{}", err);
        (warp::http::StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
    } else {
        log::error!("Unhandled Rejection: {:?}", err);
        (
            warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&msg), code))
}

/// Runs the HTTP API. `bucket_dir` is served under `/storage/picture/` when set.
pub async fn run_http_server(
    ctx: Context,
    bucket_dir: Option<PathBuf>,
    port: u16,
) -> anyhow::Result<()> {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec![
            "User-Agent",
            "Sec-Fetch-Mode",
            "Referer",
            "Origin",
            "Content-Type",
            "Access-Control-Allow-Origin",
            "Access-Control-Request-Method",
            "Access-Control-Request-Headers",
            "Access-Control-Allow-Headers",
        ])
        .allow_methods(&[
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    log::info!("Listening on port {}", port);
    match bucket_dir {
        Some(dir) => {
            let routes = api_filters(ctx)
                .or(storage_filters(dir))
                .recover(handle_rejection);
            warp::serve(routes.with(cors)).run(([0, 0, 0, 0], port)).await;
        }
        None => {
            let routes = api_filters(ctx).recover(handle_rejection);
            warp::serve(routes.with(cors)).run(([0, 0, 0, 0], port)).await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use warp::http::StatusCode;

    use crate::core::{
        api::Api,
        gate::AccessGate,
        geo::GeoData,
        memory::MemoryBackend,
        roles::{RoleCaps, RoleCatalog},
    };

    use super::{filters::api_filters, AppContext, Context};

    fn test_context(backend: Arc<MemoryBackend>) -> Context {
        Arc::new(AppContext {
            api: Api::new(backend),
            geo: GeoData::bundled(),
            catalog: RoleCatalog::default(),
            caps: RoleCaps::default(),
            gate: AccessGate::new("esbsdeutschlandretreat26"),
        })
    }

    #[tokio::test]
    async fn test_participant_routes() {
        let backend = Arc::new(MemoryBackend::default());
        let api = api_filters(test_context(backend.clone()));

        let resp = warp::test::request()
            .method("PUT")
            .path("/participant")
            .json(&serde_json::json!({"name": "Anna Keller", "email": "anna@example.org"}))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let stored: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(stored["searchName"], "ANNA KELLER");

        let resp = warp::test::request()
            .method("PATCH")
            .path(&format!("/participant/{}", stored["id"].as_str().unwrap()))
            .json(&serde_json::json!({"city": "Köln"}))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = warp::test::request().path("/participants").reply(&api).await;
        let all: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(all[0]["city"], "Köln");

        // missing email never reaches the backend
        let resp = warp::test::request()
            .method("POST")
            .path("/participant")
            .json(&serde_json::json!({"name": "Nobody", "email": ""}))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(backend.participants.lock().unwrap().len(), 1);

        let resp = warp::test::request()
            .method("DELETE")
            .path("/participant")
            .json(&serde_json::json!({"id": "42"}))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_backend_failure_is_server_error() {
        let backend = Arc::new(MemoryBackend::default());
        let api = api_filters(test_context(backend.clone()));
        backend.set_failing(true);

        let resp = warp::test::request()
            .method("PUT")
            .path("/participant")
            .json(&serde_json::json!({"name": "Anna", "email": "anna@example.org"}))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.body().as_ref(), b"backend unavailable");
        assert_ne!(resp.headers()["content-type"], "application/json");

        // reads degrade to an empty list
        let resp = warp::test::request().path("/participants").reply(&api).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "application/json");
        assert_eq!(resp.body().as_ref(), b"[]");
    }

    #[tokio::test]
    async fn test_upload_route_decodes_hint() {
        let backend = Arc::new(MemoryBackend::default());
        let api = api_filters(test_context(backend.clone()));

        let resp = warp::test::request()
            .method("POST")
            .path("/upload/profile-a%40b.org")
            .header("content-type", "image/png")
            .body(vec![0x89, 0x50])
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let url: String = serde_json::from_slice(resp.body()).unwrap();
        assert!(url.ends_with("-profile-a@b.org"));

        let objects = backend.objects.lock().unwrap();
        assert!(objects[0].0.ends_with("-profile-a@b.org"));
        assert_eq!(objects[0].1.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_geo_and_access_routes() {
        let api = api_filters(test_context(Arc::new(MemoryBackend::default())));

        let resp = warp::test::request().path("/geo/states?country=DE").reply(&api).await;
        let states: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(states.as_array().unwrap().len(), 16);
        assert!(states[0].get("cities").is_none());

        let resp = warp::test::request().path("/geo/states?country=ZZ").reply(&api).await;
        assert_eq!(resp.body().as_ref(), b"[]");

        let resp = warp::test::request()
            .path("/geo/calling-codes?q=%2B351")
            .reply(&api)
            .await;
        let codes: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(codes[0]["isoCode"], "PT");

        let resp = warp::test::request()
            .method("POST")
            .path("/access")
            .json(&serde_json::json!({"code": " ESBSDeutschlandRetreat26 "}))
            .reply(&api)
            .await;
        let access: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(access["authorized"], true);
    }

    #[tokio::test]
    async fn test_registration_routes() {
        let backend = Arc::new(MemoryBackend::default());
        let api = api_filters(test_context(backend.clone()));

        let resp = warp::test::request()
            .method("POST")
            .path("/registration/edit")
            .json(&serde_json::json!({
                "registration": {"step": "identity"},
                "edits": [
                    {"edit": "set", "args": ["email", "dana@example.org"]},
                    {"edit": "selectResidentCountry", "args": "DE"},
                    {"edit": "next"}
                ]
            }))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let view: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(view["stepNumber"], 2);
        assert_eq!(view["states"].as_array().unwrap().len(), 16);
        assert_eq!(view["missingFields"][0], "ministryName");
        let registration = view["registration"].clone();
        assert_eq!(registration["step"], "ministry");

        let resp = warp::test::request()
            .method("POST")
            .path("/registration")
            .json(&serde_json::json!({"registration": registration, "mode": "draft"}))
            .reply(&api)
            .await;
        let saved: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(saved["status"]["kind"], "idle");
        assert_eq!(saved["draftSaved"], true);
        assert_eq!(backend.participants.lock().unwrap()[0].country.as_ref().unwrap().code, "DE");

        let resp = warp::test::request()
            .method("POST")
            .path("/registration/edit")
            .json(&serde_json::json!({
                "registration": {"step": "ministry"},
                "edits": [{"edit": "toggleRole", "args": "Astronaut"}]
            }))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_directory_routes() {
        let backend = Arc::new(MemoryBackend::default());
        let api = api_filters(test_context(backend.clone()));

        warp::test::request()
            .method("PUT")
            .path("/participants")
            .json(&serde_json::json!([
                {"name": "Anna Keller", "email": "anna@example.org", "city": "Köln",
                 "country": {"name": "Germany", "code": "DE", "flag": "🇩🇪"}},
                {"name": "Ben Okafor", "email": "ben@example.org", "organization": "Alpha & Omega Stiftung"}
            ]))
            .reply(&api)
            .await;

        let resp = warp::test::request().path("/directory?q=omega").reply(&api).await;
        let entries: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(entries.as_array().unwrap().len(), 1);
        assert_eq!(entries[0]["name"], "Ben Okafor");
        assert!(entries[0]["displayPhoto"]
            .as_str()
            .unwrap()
            .starts_with("data:image/svg+xml;base64,"));

        let resp = warp::test::request().path("/directory/letters").reply(&api).await;
        let letters: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(letters["A"][0]["name"], "Anna Keller");
        assert_eq!(letters["B"][0]["name"], "Ben Okafor");

        let resp = warp::test::request().path("/map/markers").reply(&api).await;
        let markers: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(markers[0]["city"], "Köln");
    }
}
