// Totals and monthly breakdown of income vs. expenses

use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;

const MONTH_NAMES: [&str; 12] = [
    "Enero", "Febrero", "Marzo", "Abril", "Mayo", "Junio",
    "Julio", "Agosto", "Septiembre", "Octubre", "Noviembre", "Diciembre",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    /// "YYYY-MM"
    pub mes: String,
    /// "Marzo 2024"
    pub etiqueta: String,
    pub ingresos: f64,
    pub egresos: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub ingresos: f64,
    pub egresos: f64,
    pub balance: f64,
    pub cantidad: i64,
    /// Newest month first
    pub meses: Vec<MonthlySummary>,
}

/// "2024-03" → "Marzo 2024". Falls back to the key itself if it is not a month.
pub fn month_label(key: &str) -> String {
    let parsed = key
        .split_once('-')
        .and_then(|(year, month)| Some((year, month.parse::<usize>().ok()?)));

    match parsed {
        Some((year, month)) if (1..=12).contains(&month) => {
            format!("{} {}", MONTH_NAMES[month - 1], year)
        }
        _ => key.to_string(),
    }
}

pub fn get_summary(conn: &Connection) -> Result<Summary> {
    let (ingresos, egresos, cantidad): (f64, f64, i64) = conn.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN tipo = 'ingreso' THEN monto END), 0.0),
            COALESCE(SUM(CASE WHEN tipo = 'egreso' THEN monto END), 0.0),
            COUNT(*)
         FROM transacciones",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let mut stmt = conn.prepare(
        "SELECT
            substr(fecha, 1, 7) AS mes,
            COALESCE(SUM(CASE WHEN tipo = 'ingreso' THEN monto END), 0.0),
            COALESCE(SUM(CASE WHEN tipo = 'egreso' THEN monto END), 0.0)
         FROM transacciones
         GROUP BY mes
         ORDER BY mes DESC",
    )?;

    let meses = stmt
        .query_map([], |row| {
            let mes: String = row.get(0)?;
            Ok(MonthlySummary {
                etiqueta: month_label(&mes),
                mes,
                ingresos: row.get(1)?,
                egresos: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Summary {
        ingresos,
        egresos,
        balance: ingresos - egresos,
        cantidad,
        meses,
    })
}
