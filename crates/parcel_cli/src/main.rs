//! Command-line front end for the parcel tracker.
//!
//! # Responsibility
//! - Parse shell arguments and environment into repository calls.
//! - Print results as JSON on stdout; errors go to stderr.
//!
//! Exit codes: `0` ok, `1` storage or usage failure, `2` parcel not found,
//! `3` parcel not registered.

use clap::{Parser, Subcommand};
use parcel_core::db::open_db;
use parcel_core::{
    core_version, default_log_level, init_logging, ClientId, ParcelNumber, ParcelService,
    RepoError, SqliteParcelRepository,
};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "parcel", about = "Track parcels through registered, sent and delivered")]
struct Cli {
    /// SQLite database file.
    #[arg(long, env = "PARCEL_DB", default_value = "tracker.db", global = true)]
    db: PathBuf,
    /// Log level: trace|debug|info|warn|error.
    #[arg(long, env = "PARCEL_LOG_LEVEL", global = true)]
    log_level: Option<String>,
    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, env = "PARCEL_LOG_DIR", global = true)]
    log_dir: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a new parcel.
    Register {
        #[arg(long)]
        client: ClientId,
        #[arg(long)]
        address: String,
    },
    /// Show one parcel.
    Get { number: ParcelNumber },
    /// List all parcels of a client.
    List {
        #[arg(long)]
        client: ClientId,
    },
    /// Overwrite the status with any value.
    SetStatus { number: ParcelNumber, status: String },
    /// Change the address of a registered parcel.
    SetAddress { number: ParcelNumber, address: String },
    /// Mark a parcel as sent.
    Dispatch { number: ParcelNumber },
    /// Mark a parcel as delivered.
    Deliver { number: ParcelNumber },
    /// Delete a registered parcel.
    Delete { number: ParcelNumber },
    /// Print the core version.
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = match logging_config(&cli) {
        Ok(logging) => logging,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::FAILURE;
        }
    };
    if let Some((level, log_dir)) = logging {
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    }

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(CliError::Repo(err)) => {
            eprintln!("error: {err}");
            ExitCode::from(exit_code(&err))
        }
        Err(CliError::PartialList { listed, source }) => {
            println!("{listed}");
            eprintln!("error: {source}");
            ExitCode::from(exit_code(&source))
        }
        Err(CliError::Other(message)) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug)]
enum CliError {
    Repo(RepoError),
    /// Listing failed midway; `listed` holds the rows read before the failure.
    PartialList {
        listed: serde_json::Value,
        source: RepoError,
    },
    Other(String),
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Resolves `(level, log_dir)` for `init_logging`, or `None` when logging stays off.
fn logging_config(cli: &Cli) -> Result<Option<(&str, &str)>, String> {
    match (cli.log_dir.as_deref(), cli.log_level.as_deref()) {
        (Some(log_dir), level) => Ok(Some((level.unwrap_or(default_log_level()), log_dir))),
        (None, Some(level)) => Err(format!(
            "log level `{level}` given without --log-dir (PARCEL_LOG_DIR); nothing would be logged"
        )),
        (None, None) => Ok(None),
    }
}

fn run(cli: &Cli) -> Result<serde_json::Value, CliError> {
    if let Command::Version = cli.command {
        return Ok(json!({ "version": core_version() }));
    }

    let conn = open_db(&cli.db).map_err(|err| CliError::Other(err.to_string()))?;
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn)?);

    let output = match &cli.command {
        Command::Register { client, address } => {
            to_json(&service.register(*client, address.as_str())?)?
        }
        Command::Get { number } => to_json(&service.get(*number)?)?,
        Command::List { client } => match service.parcels_of_client(*client) {
            Ok(parcels) => to_json(&parcels)?,
            Err(err) => {
                return Err(CliError::PartialList {
                    listed: to_json(&err.parcels)?,
                    source: err.into_source(),
                });
            }
        },
        Command::SetStatus { number, status } => {
            service.set_status(*number, status)?;
            json!({ "number": number, "status": status })
        }
        Command::SetAddress { number, address } => {
            service.set_address(*number, address)?;
            json!({ "number": number, "updated": "address" })
        }
        Command::Dispatch { number } => {
            service.dispatch(*number)?;
            to_json(&service.get(*number)?)?
        }
        Command::Deliver { number } => {
            service.deliver(*number)?;
            to_json(&service.get(*number)?)?
        }
        Command::Delete { number } => {
            service.delete(*number)?;
            json!({ "number": number, "deleted": true })
        }
        Command::Version => json!({ "version": core_version() }),
    };
    Ok(output)
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<serde_json::Value, CliError> {
    serde_json::to_value(value).map_err(|err| CliError::Other(err.to_string()))
}

fn exit_code(err: &RepoError) -> u8 {
    match err {
        RepoError::NotFound(_) => 2,
        RepoError::NotRegistered(_) => 3,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::{exit_code, logging_config, run, Cli, CliError, Command};
    use clap::{CommandFactory, Parser};
    use parcel_core::RepoError;
    use std::path::Path;

    fn cli(db: &Path, args: &[&str]) -> Cli {
        let db = db.to_str().unwrap();
        let mut argv = vec!["parcel", "--db", db];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_register_with_global_db() {
        let cli = Cli::try_parse_from([
            "parcel", "register", "--client", "1000", "--address", "test", "--db", "x.db",
        ])
        .unwrap();
        assert_eq!(cli.db.to_str(), Some("x.db"));
        assert!(matches!(
            cli.command,
            Command::Register { client: 1000, ref address } if address == "test"
        ));
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(exit_code(&RepoError::NotFound(1)), 2);
        assert_eq!(exit_code(&RepoError::NotRegistered(1)), 3);
        assert_eq!(exit_code(&RepoError::MissingRequiredTable("parcel")), 1);
    }

    #[test]
    fn log_level_without_log_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("tracker.db");

        let err = logging_config(&cli(&db, &["--log-level", "debug", "version"])).unwrap_err();
        assert!(err.contains("--log-dir"));

        assert_eq!(logging_config(&cli(&db, &["version"])).unwrap(), None);
        let with_dir = cli(
            &db,
            &["--log-dir", "/tmp/parcel-logs", "--log-level", "warn", "version"],
        );
        assert_eq!(
            logging_config(&with_dir).unwrap(),
            Some(("warn", "/tmp/parcel-logs"))
        );
    }

    #[test]
    fn run_prints_parcels_as_json_and_enforces_guards() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("tracker.db");

        let registered = run(&cli(&db, &["register", "--client", "1000", "--address", "test"]))
            .unwrap();
        assert_eq!(registered["number"], 1);
        assert_eq!(registered["client"], 1000);
        assert_eq!(registered["status"], "registered");

        let fetched = run(&cli(&db, &["get", "1"])).unwrap();
        assert_eq!(fetched, registered);

        let dispatched = run(&cli(&db, &["dispatch", "1"])).unwrap();
        assert_eq!(dispatched["status"], "sent");

        let err = run(&cli(&db, &["set-address", "1", "elsewhere"])).unwrap_err();
        assert!(matches!(err, CliError::Repo(RepoError::NotRegistered(1))));

        let err = run(&cli(&db, &["get", "99"])).unwrap_err();
        assert!(matches!(err, CliError::Repo(RepoError::NotFound(99))));

        let listed = run(&cli(&db, &["list", "--client", "1000"])).unwrap();
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn run_returns_rows_read_before_a_list_failure() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("tracker.db");

        run(&cli(&db, &["register", "--client", "7", "--address", "a"])).unwrap();
        let conn = rusqlite::Connection::open(&db).unwrap();
        conn.execute(
            "INSERT INTO parcel (client, status, address, created_at)
             VALUES (7, X'00', 'corrupt', '2024-01-01T00:00:00Z');",
            [],
        )
        .unwrap();
        drop(conn);

        match run(&cli(&db, &["list", "--client", "7"])).unwrap_err() {
            CliError::PartialList { listed, source } => {
                let numbers: Vec<_> = listed
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|parcel| parcel["number"].clone())
                    .collect();
                assert_eq!(numbers, vec![serde_json::json!(1)]);
                assert!(source.is_storage());
                assert_eq!(exit_code(&source), 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
