//! Error taxonomy for the finance tracker.
//!
//! Row-level problems found while importing a statement are NOT errors:
//! they end up as skipped lines in the import report. Only the variants
//! below ever reach the caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinanceError {
    /// Missing or malformed input on manual creation
    #[error("Datos inválidos: {0}")]
    Validation(String),

    /// Delete (or lookup) of an id that does not exist
    #[error("No encontrada")]
    NotFound(i64),

    /// Import requested without an attached file
    #[error("No se adjuntó archivo")]
    NoFile,

    /// Unexpected failure while importing; the whole batch is discarded
    #[error("Error al procesar: {0}")]
    Import(String),

    #[error("Error de base de datos: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuración inválida: {0}")]
    Config(String),

    /// Shared state left unusable (e.g. a poisoned connection lock)
    #[error("Error interno: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, FinanceError>;
