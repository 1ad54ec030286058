use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, SqlErr};
use scratch_app::domain::{RepoCreateError, RepoError, RepoRetrieveError, RepoUpdateError};

pub mod comments;
pub mod entity;
pub mod games;
pub mod media;
pub mod tags;
pub mod tasks;
pub mod users;

pub async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(url);
    opt.max_connections(5).sqlx_logging(false);
    Database::connect(opt).await
}

pub(crate) fn repo_error(e: DbErr) -> RepoError {
    RepoError::StorageError(e.to_string())
}

pub(crate) fn retrieve_error(e: DbErr) -> RepoRetrieveError {
    RepoRetrieveError::StorageError(e.to_string())
}

pub(crate) fn create_error(e: DbErr) -> RepoCreateError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => RepoCreateError::Conflict,
        _ => RepoCreateError::StorageError(e.to_string()),
    }
}

pub(crate) fn update_error(e: DbErr) -> RepoUpdateError {
    match e {
        DbErr::RecordNotFound(_) | DbErr::RecordNotUpdated => RepoUpdateError::NotFound,
        e => match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => RepoUpdateError::Conflict,
            _ => RepoUpdateError::StorageError(e.to_string()),
        },
    }
}

#[cfg(test)]
pub(crate) async fn test_db() -> DatabaseConnection {
    use scratch_migration::MigratorTrait;

    // A single connection, since every in-memory connection is its own database.
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    scratch_migration::Migrator::up(&db, None).await.unwrap();
    db
}
