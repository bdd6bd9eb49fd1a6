use chrono::{Local, NaiveDateTime, SubsecRound};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{FinanceError, Result};

/// Format used on the wire (`fecha` in API responses)
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format used in the `fecha` column. Fixed width so TEXT ordering is
/// chronological ordering.
const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const STORAGE_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

// ============================================================================
// ENTITY
// ============================================================================

/// Direction of a movement. The amount itself is always a magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    #[serde(rename = "ingreso")]
    Income,
    #[serde(rename = "egreso")]
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "ingreso",
            TransactionKind::Expense => "egreso",
        }
    }

    /// Income for zero and positive values, expense otherwise
    pub fn from_signed(value: f64) -> Self {
        if value >= 0.0 {
            TransactionKind::Income
        } else {
            TransactionKind::Expense
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "ingreso" => Ok(TransactionKind::Income),
            "egreso" => Ok(TransactionKind::Expense),
            other => Err(FinanceError::Validation(format!(
                "tipo debe ser 'ingreso' o 'egreso', se recibió '{}'",
                other
            ))),
        }
    }
}

/// A persisted transaction. Serializes to the API representation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: i64,

    #[serde(rename = "concepto")]
    pub concept: String,

    #[serde(rename = "monto")]
    pub amount: f64,

    #[serde(rename = "tipo")]
    pub kind: TransactionKind,

    #[serde(rename = "fecha", serialize_with = "serialize_fecha")]
    pub timestamp: NaiveDateTime,
}

fn serialize_fecha<S: Serializer>(timestamp: &NaiveDateTime, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(&timestamp.format(DISPLAY_FORMAT))
}

impl Transaction {
    /// Canonical external representation
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "concepto": self.concept,
            "monto": self.amount,
            "tipo": self.kind,
            "fecha": self.timestamp.format(DISPLAY_FORMAT).to_string(),
        })
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind_str: String = row.get(3)?;
        let fecha_str: String = row.get(4)?;

        let kind = kind_str
            .parse::<TransactionKind>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
        let timestamp = NaiveDateTime::parse_from_str(&fecha_str, STORAGE_PARSE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

        Ok(Transaction {
            id: row.get(0)?,
            concept: row.get(1)?,
            amount: row.get(2)?,
            kind,
            timestamp,
        })
    }
}

// ============================================================================
// INPUT
// ============================================================================

/// Validated input for a new transaction
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub concept: String,
    pub amount: f64,
    pub kind: TransactionKind,
}

/// `monto` as posted by clients: the web form sends strings, API clients numbers
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

/// Raw body of `POST /api/transacciones`, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTransactionRequest {
    pub concepto: Option<String>,
    pub monto: Option<AmountInput>,
    pub tipo: Option<String>,
}

impl TryFrom<CreateTransactionRequest> for NewTransaction {
    type Error = FinanceError;

    fn try_from(req: CreateTransactionRequest) -> Result<Self> {
        let concept = req
            .concepto
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| FinanceError::Validation("concepto es obligatorio".to_string()))?;

        let amount = match req.monto {
            Some(AmountInput::Number(n)) => n,
            Some(AmountInput::Text(s)) => s.trim().parse::<f64>().map_err(|_| {
                FinanceError::Validation(format!("monto no es numérico: '{}'", s))
            })?,
            None => return Err(FinanceError::Validation("monto es obligatorio".to_string())),
        };
        if !amount.is_finite() || amount < 0.0 {
            return Err(FinanceError::Validation(format!(
                "monto debe ser un número no negativo, se recibió {}",
                amount
            )));
        }

        let kind = req
            .tipo
            .ok_or_else(|| FinanceError::Validation("tipo es obligatorio".to_string()))?
            .parse::<TransactionKind>()?;

        Ok(NewTransaction { concept, amount, kind })
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Open (creating if needed) the database file and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    info!(path = %path.display(), "Database ready");
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transacciones (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            concepto TEXT NOT NULL,
            monto REAL NOT NULL,
            tipo TEXT NOT NULL,
            fecha TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transacciones_fecha ON transacciones(fecha)",
        [],
    )?;

    Ok(())
}

/// Validate and persist a manual entry stamped with the current local time
pub fn create_transaction(conn: &Connection, request: CreateTransactionRequest) -> Result<Transaction> {
    let new = NewTransaction::try_from(request)?;
    insert_transaction(conn, &new, Local::now().naive_local())
}

/// Persist an already validated transaction with an explicit timestamp.
/// Works on a plain connection or inside a `rusqlite::Transaction`.
pub fn insert_transaction(conn: &Connection, new: &NewTransaction, timestamp: NaiveDateTime) -> Result<Transaction> {
    // The column keeps microseconds; hand back exactly what was stored
    let timestamp = timestamp.trunc_subsecs(6);

    conn.execute(
        "INSERT INTO transacciones (concepto, monto, tipo, fecha) VALUES (?1, ?2, ?3, ?4)",
        params![
            new.concept,
            new.amount,
            new.kind.as_str(),
            timestamp.format(STORAGE_FORMAT).to_string(),
        ],
    )?;

    let id = conn.last_insert_rowid();
    debug!(id, concepto = %new.concept, monto = new.amount, tipo = %new.kind, "Transaction inserted");

    Ok(Transaction {
        id,
        concept: new.concept.clone(),
        amount: new.amount,
        kind: new.kind,
        timestamp,
    })
}

/// All transactions, most recent first
pub fn list_transactions(conn: &Connection) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, concepto, monto, tipo, fecha
         FROM transacciones
         ORDER BY fecha DESC, id DESC",
    )?;

    let transactions = stmt
        .query_map([], Transaction::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(transactions)
}

pub fn get_transaction(conn: &Connection, id: i64) -> Result<Option<Transaction>> {
    let tx = conn
        .query_row(
            "SELECT id, concepto, monto, tipo, fecha FROM transacciones WHERE id = ?1",
            [id],
            Transaction::from_row,
        )
        .optional()?;

    Ok(tx)
}

pub fn delete_transaction(conn: &Connection, id: i64) -> Result<()> {
    let removed = conn.execute("DELETE FROM transacciones WHERE id = ?1", [id])?;
    if removed == 0 {
        return Err(FinanceError::NotFound(id));
    }

    info!(id, "Transaction deleted");
    Ok(())
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transacciones", [], |row| row.get(0))?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn request(concepto: &str, monto: AmountInput, tipo: &str) -> CreateTransactionRequest {
        CreateTransactionRequest {
            concepto: Some(concepto.to_string()),
            monto: Some(monto),
            tipo: Some(tipo.to_string()),
        }
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_create_then_list_round_trip() {
        let conn = setup();

        let created = create_transaction(&conn, request("Sueldo", AmountInput::Number(2500000.5), "ingreso")).unwrap();
        let listed = list_transactions(&conn).unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert_eq!(listed[0].concept, "Sueldo");
        assert_eq!(listed[0].amount, 2500000.5);
        assert_eq!(listed[0].kind, TransactionKind::Income);
        assert_eq!(listed[0].timestamp, created.timestamp);
    }

    #[test]
    fn test_create_accepts_amount_as_string() {
        let conn = setup();

        let created = create_transaction(&conn, request("Almuerzo", AmountInput::Text(" 35000 ".to_string()), "egreso")).unwrap();

        assert_eq!(created.amount, 35000.0);
        assert_eq!(created.kind, TransactionKind::Expense);
    }

    #[test]
    fn test_create_rejects_invalid_input() {
        let conn = setup();

        let missing_concept = CreateTransactionRequest {
            concepto: Some("   ".to_string()),
            ..request("x", AmountInput::Number(1.0), "ingreso")
        };
        let missing_amount = CreateTransactionRequest {
            monto: None,
            ..request("x", AmountInput::Number(1.0), "ingreso")
        };

        let cases = vec![
            missing_concept,
            missing_amount,
            request("x", AmountInput::Text("mucho".to_string()), "ingreso"),
            request("x", AmountInput::Number(-10.0), "egreso"),
            request("x", AmountInput::Number(10.0), "transferencia"),
            CreateTransactionRequest::default(),
        ];

        for case in cases {
            let result = create_transaction(&conn, case.clone());
            assert!(
                matches!(result, Err(FinanceError::Validation(_))),
                "expected validation error for {:?}",
                case
            );
        }

        assert_eq!(verify_count(&conn).unwrap(), 0, "Nothing should be persisted");
    }

    #[test]
    fn test_list_is_newest_first() {
        let conn = setup();
        let new = |concept: &str| NewTransaction {
            concept: concept.to_string(),
            amount: 1.0,
            kind: TransactionKind::Expense,
        };

        insert_transaction(&conn, &new("medio"), at(10, 12)).unwrap();
        insert_transaction(&conn, &new("viejo"), at(2, 8)).unwrap();
        insert_transaction(&conn, &new("nuevo"), at(28, 23)).unwrap();

        let concepts: Vec<String> = list_transactions(&conn)
            .unwrap()
            .into_iter()
            .map(|tx| tx.concept)
            .collect();

        assert_eq!(concepts, vec!["nuevo", "medio", "viejo"]);
    }

    #[test]
    fn test_delete_succeeds_once_then_not_found() {
        let conn = setup();
        let created = create_transaction(&conn, request("Luz", AmountInput::Number(180000.0), "egreso")).unwrap();

        delete_transaction(&conn, created.id).unwrap();
        assert!(get_transaction(&conn, created.id).unwrap().is_none());

        let second = delete_transaction(&conn, created.id);
        assert!(matches!(second, Err(FinanceError::NotFound(id)) if id == created.id));
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        let conn = setup();
        let first = create_transaction(&conn, request("a", AmountInput::Number(1.0), "ingreso")).unwrap();
        delete_transaction(&conn, first.id).unwrap();

        let second = create_transaction(&conn, request("b", AmountInput::Number(1.0), "ingreso")).unwrap();

        assert!(second.id > first.id);
    }

    #[test]
    fn test_serialize_format() {
        let tx = Transaction {
            id: 3,
            concept: "Supermercado".to_string(),
            amount: 120000.0,
            kind: TransactionKind::Expense,
            timestamp: at(15, 9).with_nanosecond(250_000_000).unwrap(),
        };

        let json = serde_json::to_value(&tx).unwrap();

        assert_eq!(json["id"], 3);
        assert_eq!(json["concepto"], "Supermercado");
        assert_eq!(json["monto"], 120000.0);
        assert_eq!(json["tipo"], "egreso");
        assert_eq!(json["fecha"], "2024-03-15 09:00:00");
        assert_eq!(json, tx.to_json());
    }

    #[test]
    fn test_open_database_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finanzas.db");
        assert!(!path.exists());

        let conn = open_database(&path).unwrap();

        assert!(path.exists());
        assert_eq!(verify_count(&conn).unwrap(), 0);
    }
}
