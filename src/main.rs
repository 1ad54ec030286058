use std::sync::Arc;

use log::{error, info, warn};
use scratch_app::{AppSettings, build_application};
use scratch_email_lettre::{MailerAdapter, MailerSetupError};
use scratch_http_api::HttpSettings;
use scratch_migration::{DbErr, Migrator, MigratorTrait};
use scratch_persistence_sea_orm::{
    comments::CommentRepositoryImpl, games::GameRepositoryImpl, media::MediaRepositoryImpl,
    tags::TagRepositoryImpl, tasks::TaskRepositoryImpl, users::UserRepositoryImpl,
};
use scratch_search_meili::{MeiliSearchAdapter, SearchAdapter};
use scratch_storage::{FirebaseObjectStorage, LocalObjectStorage, StorageAdapter};
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, ConfigError, StorageConfig};

mod config;
mod logs;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to initialize logging: {0}")]
    Logger(#[from] logs::LoggerError),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Mailer setup failed: {0}")]
    Mailer(#[from] MailerSetupError),
    #[error("Storage setup failed: {0}")]
    Storage(#[from] scratch_app::ports::storage::StorageError),
    #[error("Search setup failed: {0}")]
    Search(#[from] scratch_app::ports::search::SearchError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received. Preparing graceful exit...");
}

async fn build_search(config: &AppConfig) -> Result<SearchAdapter, StartupError> {
    let Some(search) = &config.search else {
        return Ok(SearchAdapter::Disabled);
    };
    let adapter = MeiliSearchAdapter::new(&search.url, search.api_key.as_deref())?;
    if let Err(e) = adapter.configure().await {
        warn!("Failed to configure search index at {}: {}", search.url, e);
    }
    Ok(SearchAdapter::Meili(adapter))
}

fn build_storage(config: &AppConfig) -> Result<StorageAdapter, StartupError> {
    match &config.storage {
        StorageConfig::Local { root } => {
            std::fs::create_dir_all(root)?;
            Ok(StorageAdapter::Local(LocalObjectStorage::new(root.clone())))
        }
        StorageConfig::Firebase {
            credentials,
            bucket,
        } => Ok(StorageAdapter::Firebase(
            FirebaseObjectStorage::from_credentials_file(credentials, bucket)?,
        )),
    }
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("No .env file loaded: {}", e);
    }

    let config = AppConfig::from_env()?;
    logs::init_logger(&config.log_file_path, &config.log_archive_pattern)?;

    let db = scratch_persistence_sea_orm::connect(&config.database_url).await?;
    Migrator::up(&db, None).await?;
    info!("Database migrations applied");

    let email = Arc::new(MailerAdapter::from_settings(
        config.smtp.as_ref(),
        &config.mail_from,
    )?);
    let search = Arc::new(build_search(&config).await?);
    let storage = build_storage(&config)?;
    let media_root = match &storage {
        StorageAdapter::Local(local) => Some(local.root().to_path_buf()),
        StorageAdapter::Firebase(_) => None,
    };

    let settings = AppSettings {
        base_url: config.base_url.clone(),
        secret_key: config.secret_key.clone(),
        totp_issuer: config.totp_issuer.clone(),
        bcrypt_cost: config.bcrypt_cost,
    };
    let shutdown = CancellationToken::new();
    let (app, jobs) = build_application(
        &settings,
        Arc::new(UserRepositoryImpl::new(db.clone())),
        Arc::new(GameRepositoryImpl::new(db.clone())),
        Arc::new(MediaRepositoryImpl::new(db.clone())),
        Arc::new(TagRepositoryImpl::new(db.clone())),
        Arc::new(CommentRepositoryImpl::new(db.clone())),
        Arc::new(TaskRepositoryImpl::new(db)),
        Arc::new(storage),
        search,
        email,
        shutdown.clone(),
    );

    let http_settings = HttpSettings {
        host: config.host.clone(),
        port: config.port,
        secure_cookies: config.secure_cookies,
        max_upload_bytes: config.max_upload_bytes,
        media_root,
    };

    info!("Starting application");
    let result = scratch_http_api::run(Arc::new(app), http_settings, shutdown_signal()).await;

    shutdown.cancel();
    if let Err(e) = jobs.await {
        error!("Job runner failed: {}", e);
    }

    info!("Application shut down gracefully");
    Ok(result?)
}
