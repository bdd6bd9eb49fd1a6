use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;

use finanzas::{
    get_summary, import_file, init_logging, list_transactions, open_database, Config,
    TransactionKind,
};

const USAGE: &str = "Uso: finanzas [--db <ruta>] <importar <archivo> | listar | resumen>";

fn main() -> Result<()> {
    init_logging();

    let (config, args) = Config::from_args(env::args().skip(1))?;

    match args.first().map(String::as_str) {
        Some("importar") => {
            let file = args.get(1).context(USAGE)?;
            run_import(&config, Path::new(file))?;
        }
        Some("listar") => run_list(&config)?,
        Some("resumen") => run_summary(&config)?,
        _ => bail!(USAGE),
    }

    Ok(())
}

fn run_import(config: &Config, file: &Path) -> Result<()> {
    println!("📂 Importando {}", file.display());

    let mut conn = open_database(&config.db_path)
        .with_context(|| format!("No se pudo abrir {}", config.db_path.display()))?;
    let report = import_file(&mut conn, file)?;

    for (line_number, reason) in report.skipped() {
        println!("   línea {} omitida: {}", line_number, reason);
    }

    println!("✓ {}", report.message());
    if report.skipped_count() > 0 {
        println!("✓ Líneas omitidas: {}", report.skipped_count());
    }

    Ok(())
}

fn run_list(config: &Config) -> Result<()> {
    let conn = open_database(&config.db_path)
        .with_context(|| format!("No se pudo abrir {}", config.db_path.display()))?;
    let transactions = list_transactions(&conn)?;

    if transactions.is_empty() {
        println!("No hay movimientos registrados");
        return Ok(());
    }

    for tx in &transactions {
        let sign = match tx.kind {
            TransactionKind::Income => '+',
            TransactionKind::Expense => '-',
        };
        println!(
            "{:>5}  {}  {}{:>15.2}  {}",
            tx.id,
            tx.timestamp.format(finanzas::db::DISPLAY_FORMAT),
            sign,
            tx.amount,
            tx.concept
        );
    }
    println!("\n{} movimientos", transactions.len());

    Ok(())
}

fn run_summary(config: &Config) -> Result<()> {
    let conn = open_database(&config.db_path)
        .with_context(|| format!("No se pudo abrir {}", config.db_path.display()))?;
    let summary = get_summary(&conn)?;

    println!("📊 Resumen ({} movimientos)", summary.cantidad);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Ingresos: {:>18.2}", summary.ingresos);
    println!("Egresos:  {:>18.2}", summary.egresos);
    println!("Balance:  {:>18.2}", summary.balance);

    for month in &summary.meses {
        println!(
            "\n{}\n   Ingresaste: {:.2}\n   Gastaste:   {:.2}",
            month.etiqueta, month.ingresos, month.egresos
        );
    }

    Ok(())
}
