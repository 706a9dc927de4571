use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::anyhow;
use clap::{Parser, Subcommand};

use crate::{
    core::{
        api::Api,
        bucket::ImageBucket,
        db::{Backend, DirectoryDb},
        directory::{filter_city, search},
        gate::{AccessGate, LocalStorage, ACCESS_FLAG},
        geo::GeoData,
        participant::Participant,
        settings::{BackendSettings, Settings},
    },
    integrations::supabase::RestBackend,
    web::{run_http_server, AppContext},
};

mod core;
mod error;
mod integrations;
mod web;

#[derive(Parser, Debug)]
#[command(name = "leaders-directory")]
#[command(version = "0.1")]
#[command(about = "Registration and directory service for conference attendees.", long_about = None)]
struct Args {
    /// Location of the settings file.
    #[arg(short, long, default_value = "settings.json")]
    settings: PathBuf,

    #[command(subcommand)]
    command: RunType,
}

#[derive(Subcommand, Debug)]
enum RunType {
    /// Run the HTTP API.
    Serve,

    /// Create the local database and image bucket.
    Init,

    /// Insert or replace participants from a JSON array, keyed on email.
    Import { file: PathBuf },

    /// Write all participants as JSON, to stdout if no file is given.
    Export { file: Option<PathBuf> },

    /// Store a key/value setting in the local database.
    SetSetting { key: String, value: String },

    /// List the directory, asking for the access code on first use.
    List {
        /// Filter by name, organization, city or country.
        query: Option<String>,

        #[arg(long)]
        city: Option<String>,

        /// Access code, prompted for if missing.
        #[arg(short, long)]
        code: Option<String>,
    },

    /// Forget a previously entered access code.
    Lock,
}

async fn open_local_db(database: &PathBuf, bucket_dir: &PathBuf, public_url: &str) -> anyhow::Result<DirectoryDb> {
    DirectoryDb::init(database, ImageBucket::new(bucket_dir.clone(), public_url)).await
}

/// Returns the configured backend and the bucket directory to serve, if local.
async fn open_backend(settings: &Settings) -> anyhow::Result<(Arc<dyn Backend>, Option<PathBuf>)> {
    match &settings.backend {
        BackendSettings::Sqlite {
            database,
            bucket_dir,
            public_url,
        } => {
            let backend: Arc<dyn Backend> =
                Arc::new(open_local_db(database, bucket_dir, public_url).await?);
            Ok((backend, Some(bucket_dir.clone())))
        }
        BackendSettings::Rest { url, api_key } => {
            log::info!("Using hosted backend at {}", url);
            let backend: Arc<dyn Backend> = Arc::new(RestBackend::new(url, api_key)?);
            Ok((backend, None))
        }
    }
}

fn prompt(message: &str) -> anyhow::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let settings = Settings::load(&args.settings)?;

    match args.command {
        RunType::Serve => {
            let (backend, bucket_dir) = open_backend(&settings).await?;
            let ctx = Arc::new(AppContext {
                api: Api::new(backend),
                geo: GeoData::bundled(),
                catalog: settings.role_catalog(),
                caps: settings.role_caps,
                gate: AccessGate::new(&settings.access_code),
            });

            run_http_server(ctx, bucket_dir, settings.web_port()).await?;
        }
        RunType::Init => match &settings.backend {
            BackendSettings::Sqlite {
                database,
                bucket_dir,
                public_url,
            } => {
                open_local_db(database, bucket_dir, public_url).await?;
                fs::create_dir_all(bucket_dir)?;
                log::info!("Initialized {}", database.display());
            }
            BackendSettings::Rest { .. } => {
                log::info!("Nothing to initialize for a hosted backend");
            }
        },
        RunType::Import { file } => {
            let participants: Vec<Participant> = serde_json::from_str(&fs::read_to_string(&file)?)?;
            let (backend, _) = open_backend(&settings).await?;
            Api::new(backend)
                .bulk_upsert_participants(participants)
                .await?;
        }
        RunType::Export { file } => {
            let (backend, _) = open_backend(&settings).await?;
            let participants = Api::new(backend).get_participants().await;
            let json = serde_json::to_string_pretty(&participants)?;

            match file {
                Some(file) => {
                    fs::write(&file, json)?;
                    log::info!("Exported {} participants to {}", participants.len(), file.display());
                }
                None => println!("{}", json),
            }
        }
        RunType::SetSetting { key, value } => match &settings.backend {
            BackendSettings::Sqlite {
                database,
                bucket_dir,
                public_url,
            } => {
                let db = open_local_db(database, bucket_dir, public_url).await?;
                db.set_setting(&key, &value).await?;
            }
            BackendSettings::Rest { .. } => {
                return Err(anyhow!("Settings of a hosted backend are managed there"));
            }
        },
        RunType::List { query, city, code } => {
            let mut storage = LocalStorage::open(settings.local_storage_path())?;
            if !AccessGate::is_authorized(&storage) {
                let input = match code {
                    Some(code) => code,
                    None => prompt("Access code: ")?,
                };
                let gate = AccessGate::new(&settings.access_code);
                if !gate.unlock(&input, &mut storage)? {
                    return Err(anyhow!("Invalid access code"));
                }
            }

            let (backend, _) = open_backend(&settings).await?;
            let participants = Api::new(backend).get_participants().await;

            let mut matches = search(&participants, query.as_deref().unwrap_or(""));
            if let Some(city) = &city {
                matches = filter_city(matches, city);
            }

            for p in matches {
                println!(
                    "{}\t{}\t{}\t{}",
                    p.name,
                    p.organization,
                    p.city.as_deref().unwrap_or(""),
                    p.country.as_ref().map(|c| c.name.as_str()).unwrap_or("")
                );
            }
        }
        RunType::Lock => {
            LocalStorage::open(settings.local_storage_path())?.remove(ACCESS_FLAG)?;
            log::info!("Access code forgotten");
        }
    }

    Ok(())
}
