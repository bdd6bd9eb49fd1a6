//! Runtime configuration shared by the CLI and the API server.
//!
//! Defaults match a local single-user install: `finanzas.db` in the working
//! directory, served on `127.0.0.1:5600`. Flags override them.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::error::{FinanceError, Result};

pub const DEFAULT_DB_PATH: &str = "finanzas.db";
pub const DEFAULT_PORT: u16 = 5600;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Parse `--db`, `--host`, `--port` and `--max-upload` flags.
    ///
    /// Anything that is not a flag is returned untouched, in order, so the
    /// CLI can read its command and arguments from it.
    pub fn from_args<I>(args: I) -> Result<(Self, Vec<String>)>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut rest = Vec::new();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            if !arg.starts_with("--") {
                rest.push(arg);
                continue;
            }

            let value = args
                .next()
                .ok_or_else(|| FinanceError::Config(format!("falta el valor de {}", arg)))?;

            match arg.as_str() {
                "--db" => config.db_path = PathBuf::from(value),
                "--host" => config.host = parse_value(&arg, &value)?,
                "--port" => config.port = parse_value(&arg, &value)?,
                "--max-upload" => config.max_upload_bytes = parse_value(&arg, &value)?,
                other => return Err(FinanceError::Config(format!("opción desconocida: {}", other))),
            }
        }

        Ok((config, rest))
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| FinanceError::Config(format!("valor inválido para {}: '{}'", flag, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let (config, rest) = Config::from_args(Vec::new()).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:5600");
        assert!(rest.is_empty());
    }

    #[test]
    fn test_flags_and_positionals() {
        let (config, rest) = Config::from_args(args(&[
            "--db", "/tmp/otra.db", "importar", "extracto.csv", "--port", "8080", "--host", "0.0.0.0",
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/otra.db"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(rest, args(&["importar", "extracto.csv"]));
    }

    #[test]
    fn test_invalid_flags() {
        assert!(matches!(Config::from_args(args(&["--port", "noventa"])), Err(FinanceError::Config(_))));
        assert!(matches!(Config::from_args(args(&["--db"])), Err(FinanceError::Config(_))));
        assert!(matches!(Config::from_args(args(&["--verbose", "1"])), Err(FinanceError::Config(_))));
    }
}
