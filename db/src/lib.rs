pub mod models;
pub mod test_utils;

use sea_orm::{Database, DatabaseConnection, DbErr};
use util::config::{database_file, database_url};

/// Opens the attendance store.
///
/// `path_or_url` may be a `sqlite:` DSN or a plain SQLite file path; for the
/// latter the parent directory is created and the file is opened in create mode.
pub async fn connect(path_or_url: &str) -> Result<DatabaseConnection, DbErr> {
    if let Some(parent) = database_file(path_or_url).and_then(|f| f.parent()) {
        // SQLite won't create intermediate dirs.
        if let Err(err) = std::fs::create_dir_all(parent) {
            tracing::warn!(dir = %parent.display(), error = %err, "could not create database directory");
        }
    }

    let url = database_url(path_or_url);
    tracing::debug!(%url, "connecting to database");
    Database::connect(&url).await
}
