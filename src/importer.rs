// Statement Importer
// Parsed statement lines → one atomic batch of inserts

use chrono::Local;
use rusqlite::Connection;
use std::fmt::Display;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::db::{insert_transaction, Transaction};
use crate::error::{FinanceError, Result};
use crate::parser::{parse_statement, ParsedLine, SkipReason};

/// What happened to one data line of the statement
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Imported { line_number: usize, transaction: Transaction },
    Skipped { line_number: usize, reason: SkipReason },
}

/// Result of a committed import, one outcome per line after the header
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub outcomes: Vec<RowOutcome>,
}

impl ImportReport {
    pub fn imported_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RowOutcome::Imported { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.imported_count()
    }

    pub fn imported(&self) -> impl Iterator<Item = &Transaction> {
        self.outcomes.iter().filter_map(|o| match o {
            RowOutcome::Imported { transaction, .. } => Some(transaction),
            RowOutcome::Skipped { .. } => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (usize, &SkipReason)> {
        self.outcomes.iter().filter_map(|o| match o {
            RowOutcome::Skipped { line_number, reason } => Some((*line_number, reason)),
            RowOutcome::Imported { .. } => None,
        })
    }

    /// User-facing confirmation returned by the import endpoint
    pub fn message(&self) -> String {
        format!("Se importaron {} movimientos con éxito", self.imported_count())
    }
}

fn import_failure(err: impl Display) -> FinanceError {
    FinanceError::Import(err.to_string())
}

/// Import a raw statement export.
///
/// Malformed lines are skipped and reported. Any other failure rolls back the
/// whole batch and surfaces as `FinanceError::Import`.
pub fn import_statement(conn: &mut Connection, bytes: &[u8]) -> Result<ImportReport> {
    let lines = parse_statement(bytes);

    // Dropping `batch` without commit rolls everything back
    let batch = conn.transaction().map_err(import_failure)?;
    let mut outcomes = Vec::with_capacity(lines.len());

    for line in lines {
        match line {
            ParsedLine::Row(row) => {
                let transaction = insert_transaction(&batch, &row.to_new_transaction(), Local::now().naive_local())
                    .map_err(import_failure)?;
                outcomes.push(RowOutcome::Imported {
                    line_number: row.line_number,
                    transaction,
                });
            }
            ParsedLine::Skipped { line_number, reason } => {
                debug!(line_number, %reason, "Statement line skipped");
                outcomes.push(RowOutcome::Skipped { line_number, reason });
            }
        }
    }

    batch.commit().map_err(import_failure)?;

    let report = ImportReport { outcomes };
    info!(
        imported = report.imported_count(),
        skipped = report.skipped_count(),
        "Statement import committed"
    );

    Ok(report)
}

/// Import a statement file from disk
pub fn import_file(conn: &mut Connection, path: &Path) -> Result<ImportReport> {
    let bytes = std::fs::read(path).map_err(|e| {
        warn!(path = %path.display(), error = %e, "Cannot read statement file");
        import_failure(format!("{}: {}", path.display(), e))
    })?;

    import_statement(conn, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{list_transactions, setup_database, verify_count, TransactionKind};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn statement(rows: &[&str]) -> Vec<u8> {
        let mut text = String::from(
            "EXTRACTO DE CUENTA\nBanco\nCliente\nCuenta\nDesde\nHasta\nMoneda: GS\nFecha;Ref;Descripcion;Sucursal;Importe\n",
        );
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text.into_bytes()
    }

    #[test]
    fn test_import_valid_and_invalid_rows() {
        let mut conn = setup();
        let bytes = statement(&[
            "01/03/24;001;SALARIO;Central;4.500.000",
            "02/03/24;002;SUPERMERCADO;Central;no-es-numero",
        ]);

        let report = import_statement(&mut conn, &bytes).unwrap();

        assert_eq!(report.imported_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.message(), "Se importaron 1 movimientos con éxito");
        assert_eq!(verify_count(&conn).unwrap(), 1);

        let stored = list_transactions(&conn).unwrap();
        assert_eq!(stored[0].concept, "SALARIO");
        assert_eq!(stored[0].amount, 4500000.0);
        assert_eq!(stored[0].kind, TransactionKind::Income);

        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].0, 10);
        assert!(matches!(skipped[0].1, SkipReason::UnparsableAmount { .. }));
    }

    #[test]
    fn test_import_normalizes_amounts() {
        let mut conn = setup();
        let bytes = statement(&["d;r;Deposito;x;100.000,50", "d;r;Pago tarjeta;x;-2.500"]);

        let report = import_statement(&mut conn, &bytes).unwrap();
        let imported: Vec<&Transaction> = report.imported().collect();

        assert_eq!(imported.len(), 2);
        assert_eq!(imported[0].amount, 100000.50);
        assert_eq!(imported[0].kind, TransactionKind::Income);
        assert_eq!(imported[1].amount, 2500.0);
        assert_eq!(imported[1].kind, TransactionKind::Expense);
    }

    #[test]
    fn test_short_rows_do_not_count() {
        let mut conn = setup();
        let bytes = statement(&["solo;tres;campos", "d;r;Cuota;x;"]);

        let report = import_statement(&mut conn, &bytes).unwrap();

        assert_eq!(report.imported_count(), 0);
        assert_eq!(report.skipped_count(), 2);
        assert_eq!(verify_count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_header_only_statement_imports_nothing() {
        let mut conn = setup();

        let report = import_statement(&mut conn, &statement(&[])).unwrap();

        assert_eq!(report.imported_count(), 0);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.message(), "Se importaron 0 movimientos con éxito");
    }

    #[test]
    fn test_store_failure_aborts_import() {
        let mut conn = setup();
        // Break the store so the first insert fails
        conn.execute("DROP TABLE transacciones", []).unwrap();

        let result = import_statement(&mut conn, &statement(&["d;r;Venta;x;10"]));

        assert!(matches!(result, Err(FinanceError::Import(_))));
    }

    #[test]
    fn test_rollback_discards_earlier_rows() {
        let mut conn = setup();
        // The second row is rejected after the first one was already inserted
        conn.execute_batch(
            "CREATE TRIGGER rechazar BEFORE INSERT ON transacciones
             WHEN NEW.concepto = 'ROMPE'
             BEGIN SELECT RAISE(ABORT, 'rechazado'); END;",
        )
        .unwrap();

        let result = import_statement(&mut conn, &statement(&["d;r;OK;x;10", "d;r;ROMPE;x;20"]));

        assert!(matches!(result, Err(FinanceError::Import(ref msg)) if msg.contains("rechazado")));
        assert_eq!(verify_count(&conn).unwrap(), 0, "Batch must be rolled back");
    }

    #[test]
    fn test_import_file_missing() {
        let mut conn = setup();

        let result = import_file(&mut conn, Path::new("/no/existe/extracto.csv"));

        assert!(matches!(result, Err(FinanceError::Import(_))));
    }

    #[test]
    fn test_import_file_from_disk() {
        let mut conn = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extracto.csv");
        std::fs::write(&path, statement(&["d;r;Intereses;x;1.250,00"])).unwrap();

        let report = import_file(&mut conn, &path).unwrap();

        assert_eq!(report.imported_count(), 1);
    }
}
