// Finanzas - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod config;
pub mod db;
pub mod error;
pub mod importer;
pub mod parser;
pub mod summary;

// Only compile the HTTP layer when the server feature is enabled
#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::Config;
pub use db::{
    Transaction, TransactionKind, NewTransaction, CreateTransactionRequest, AmountInput,
    open_database, setup_database, create_transaction, insert_transaction,
    list_transactions, get_transaction, delete_transaction, verify_count,
};
pub use error::{FinanceError, Result};
pub use importer::{ImportReport, RowOutcome, import_statement, import_file};
pub use parser::{
    ParsedLine, SkipReason, StatementRow,
    decode_latin1, normalize_amount, parse_amount, parse_statement,
};
pub use summary::{MonthlySummary, Summary, get_summary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the tracing subscriber used by both binaries.
/// `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
