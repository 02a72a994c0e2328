use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("MigrateError - Sqlx: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("MigrateError - MigrationFailure: '{name}' failed: {message}")]
    MigrationFailure { name: String, message: String },
    #[error("MigrateError - UnknownStatus: '{0}' in migration log")]
    UnknownStatus(String),
}
