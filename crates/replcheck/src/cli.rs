//! Command-line arguments of both tools.
//!
//! Unset connection options default the way the directory server tools do:
//! the user id defaults to the database name and the schema to the user id.

use std::convert::Infallible;
use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use replcheck_core::Schema;
use replcheck_store::PostgresConfig;
use secrecy::SecretString;

use crate::config::{DiffConfig, Endpoint, EndpointSource, MetricsConfig, ReportFormat};
use crate::error::{Result, ToolError};
use crate::logging::LogLevel;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 50000;

fn secret(value: &str) -> std::result::Result<SecretString, Infallible> {
    Ok(SecretString::new(value.to_string()))
}

/// Parse the process arguments. Prints help or usage and exits on
/// failure: status 0 for `--help`/`--version`, 1 otherwise.
pub fn parse_or_exit<T: Parser>() -> T {
    match T::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    }
}

/// Connection options for one backing store, before defaults apply.
#[derive(Debug, Clone)]
pub struct EndpointArgs {
    pub dbname: Option<String>,
    pub hostname: String,
    pub port: u16,
    pub schema: Option<String>,
    pub userid: Option<String>,
    pub password: Option<SecretString>,
    pub sqlite: Option<PathBuf>,
}

impl EndpointArgs {
    /// Apply defaults. `suffix` names the flags in messages (`"1"`, `"2"` or `""`).
    pub fn resolve(self, suffix: &str) -> Result<Endpoint> {
        let userid = self.userid.or_else(|| self.dbname.clone());
        let schema = self.schema.or_else(|| userid.clone()).ok_or_else(|| {
            ToolError::Config(format!("--schema{} is required with --sqlite{}", suffix, suffix))
        })?;
        let schema = Schema::new(schema)?;

        let source = match self.sqlite {
            Some(path) => EndpointSource::Snapshot(path),
            None => {
                let (Some(database), Some(username)) = (self.dbname, userid) else {
                    return Err(ToolError::Config(format!("--dbname{} is required", suffix)));
                };
                let password = self.password.ok_or_else(|| {
                    ToolError::Config(format!("--password{} is required", suffix))
                })?;
                EndpointSource::Network(PostgresConfig {
                    host: self.hostname,
                    port: self.port,
                    database,
                    username,
                    password,
                })
            }
        };
        Ok(Endpoint { source, schema })
    }
}

fn format(csv: bool) -> ReportFormat {
    if csv {
        ReportFormat::Csv
    } else {
        ReportFormat::Text
    }
}

/// Compare the entries of two directory server replicas.
///
/// Reports entries whose modify timestamps differ and entries present on
/// only one of the two servers.
#[derive(Debug, Parser)]
#[command(name = "ldap-sdiff", version)]
pub struct SdiffArgs {
    /// Database name of the first server
    #[arg(long, required_unless_present = "sqlite1")]
    pub dbname1: Option<String>,
    /// Host of the first server
    #[arg(long, default_value = DEFAULT_HOST)]
    pub hostname1: String,
    /// Port of the first server
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port1: u16,
    /// Schema of the first server (default: userid1)
    #[arg(long)]
    pub schema1: Option<String>,
    /// User of the first server (default: dbname1)
    #[arg(long)]
    pub userid1: Option<String>,
    /// Password of the first server
    #[arg(long, value_parser = secret, required_unless_present = "sqlite1")]
    pub password1: Option<SecretString>,
    /// Read the first server from an SQLite snapshot instead
    #[arg(long, value_name = "PATH")]
    pub sqlite1: Option<PathBuf>,

    /// Database name of the second server
    #[arg(long, required_unless_present = "sqlite2")]
    pub dbname2: Option<String>,
    /// Host of the second server
    #[arg(long, default_value = DEFAULT_HOST)]
    pub hostname2: String,
    /// Port of the second server
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port2: u16,
    /// Schema of the second server (default: userid2)
    #[arg(long)]
    pub schema2: Option<String>,
    /// User of the second server (default: dbname2)
    #[arg(long)]
    pub userid2: Option<String>,
    /// Password of the second server
    #[arg(long, value_parser = secret, required_unless_present = "sqlite2")]
    pub password2: Option<SecretString>,
    /// Read the second server from an SQLite snapshot instead
    #[arg(long, value_name = "PATH")]
    pub sqlite2: Option<PathBuf>,

    /// Write CSV instead of text
    #[arg(long, action = ArgAction::Set, value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_value = "false", default_missing_value = "true")]
    pub outputcsv: bool,
    /// Write the report to this file instead of stdout
    #[arg(long = "output_file", value_name = "PATH")]
    pub output_file: Option<PathBuf>,
    /// Log level
    #[arg(long, value_enum, ignore_case = true, default_value = "critical")]
    pub loglevel: LogLevel,
    /// Raise log verbosity: 1 info, 2 debug, 3 trace
    #[arg(long, default_value_t = 0)]
    pub verbose: u8,
}

impl SdiffArgs {
    pub fn log_level(&self) -> LogLevel {
        self.loglevel.raised_by(self.verbose)
    }

    pub fn into_config(self) -> Result<DiffConfig> {
        let first = EndpointArgs {
            dbname: self.dbname1,
            hostname: self.hostname1,
            port: self.port1,
            schema: self.schema1,
            userid: self.userid1,
            password: self.password1,
            sqlite: self.sqlite1,
        }
        .resolve("1")?;
        let second = EndpointArgs {
            dbname: self.dbname2,
            hostname: self.hostname2,
            port: self.port2,
            schema: self.schema2,
            userid: self.userid2,
            password: self.password2,
            sqlite: self.sqlite2,
        }
        .resolve("2")?;

        Ok(DiffConfig {
            first,
            second,
            format: format(self.outputcsv),
            output_file: self.output_file,
        })
    }
}

/// Report replication lag for every replication context of a server.
///
/// For each consumer: the age of the last change it applied, its queue
/// length, and the age of the oldest change it has not applied yet.
#[derive(Debug, Parser)]
#[command(name = "repl-data", version)]
pub struct ReplDataArgs {
    /// Database name
    #[arg(long, required_unless_present = "sqlite")]
    pub dbname: Option<String>,
    /// Host
    #[arg(long, default_value = DEFAULT_HOST)]
    pub hostname: String,
    /// Port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Schema (default: userid)
    #[arg(long)]
    pub schema: Option<String>,
    /// User (default: dbname)
    #[arg(long)]
    pub userid: Option<String>,
    /// Password
    #[arg(long, value_parser = secret, required_unless_present = "sqlite")]
    pub password: Option<SecretString>,
    /// Read from an SQLite snapshot instead of a database server
    #[arg(long, value_name = "PATH")]
    pub sqlite: Option<PathBuf>,

    /// Report only this consumer
    #[arg(long)]
    pub replica: Option<String>,
    /// Write CSV instead of text
    #[arg(long, action = ArgAction::Set, value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_value = "false", default_missing_value = "true")]
    pub outputcsv: bool,
    /// Write the report to this file instead of stdout
    #[arg(long = "output_file", value_name = "PATH")]
    pub output_file: Option<PathBuf>,
    /// Log level
    #[arg(long, value_enum, ignore_case = true, default_value = "critical")]
    pub loglevel: LogLevel,
}

impl ReplDataArgs {
    pub fn into_config(self) -> Result<MetricsConfig> {
        let endpoint = EndpointArgs {
            dbname: self.dbname,
            hostname: self.hostname,
            port: self.port,
            schema: self.schema,
            userid: self.userid,
            password: self.password,
            sqlite: self.sqlite,
        }
        .resolve("")?;

        Ok(MetricsConfig {
            endpoint,
            replica: self.replica,
            format: format(self.outputcsv),
            output_file: self.output_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use secrecy::ExposeSecret;

    fn sdiff(args: &[&str]) -> std::result::Result<SdiffArgs, clap::Error> {
        SdiffArgs::try_parse_from(std::iter::once("ldap-sdiff").chain(args.iter().copied()))
    }

    fn repl_data(args: &[&str]) -> std::result::Result<ReplDataArgs, clap::Error> {
        ReplDataArgs::try_parse_from(std::iter::once("repl-data").chain(args.iter().copied()))
    }

    #[test]
    fn test_sdiff_defaults() {
        let config = sdiff(&[
            "--dbname1", "ldapdb1", "--password1", "p1", "--dbname2", "ldapdb2", "--password2",
            "p2",
        ])
        .unwrap()
        .into_config()
        .unwrap();

        let EndpointSource::Network(first) = &config.first.source else {
            panic!("expected a network endpoint");
        };
        assert_eq!(first.host, "localhost");
        assert_eq!(first.port, 50000);
        assert_eq!(first.username, "ldapdb1");
        assert_eq!(first.password.expose_secret(), "p1");
        assert_eq!(config.first.schema.as_str(), "ldapdb1");
        assert_eq!(config.second.schema.as_str(), "ldapdb2");
        assert_eq!(config.format, ReportFormat::Text);
        assert!(config.output_file.is_none());
    }

    #[test]
    fn test_schema_defaults_to_userid() {
        let config = sdiff(&[
            "--dbname1", "db", "--userid1", "ldapuser", "--password1", "p", "--dbname2", "db",
            "--password2", "p", "--schema2", "OTHER",
        ])
        .unwrap()
        .into_config()
        .unwrap();
        assert_eq!(config.first.schema.as_str(), "ldapuser");
        assert_eq!(config.second.schema.as_str(), "OTHER");
    }

    #[test]
    fn test_missing_required_arguments() {
        let err = sdiff(&["--dbname1", "db", "--password1", "p"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(err.use_stderr());

        let err = repl_data(&["--dbname", "db"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_help_is_not_an_error_exit() {
        let err = repl_data(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert!(!err.use_stderr());
    }

    #[test]
    fn test_sqlite_replaces_network_flags() {
        let config = sdiff(&[
            "--sqlite1", "one.db", "--schema1", "LDAPDB2", "--sqlite2", "two.db", "--schema2",
            "LDAPDB2",
        ])
        .unwrap()
        .into_config()
        .unwrap();
        assert!(matches!(config.first.source, EndpointSource::Snapshot(ref p) if p == &PathBuf::from("one.db")));
        assert!(matches!(config.second.source, EndpointSource::Snapshot(_)));
    }

    #[test]
    fn test_sqlite_needs_a_schema() {
        let err = repl_data(&["--sqlite", "snap.db"])
            .unwrap()
            .into_config()
            .unwrap_err();
        assert!(matches!(err, ToolError::Config(ref m) if m.contains("--schema")));
    }

    #[test]
    fn test_invalid_schema() {
        let err = repl_data(&["--dbname", "db", "--password", "p", "--schema", "bad;name"])
            .unwrap()
            .into_config()
            .unwrap_err();
        assert!(matches!(err, ToolError::Schema(_)));
    }

    #[test]
    fn test_outputcsv_is_boolish() {
        let base = ["--dbname", "db", "--password", "p"];
        let parse = |extra: &[&str]| {
            let args: Vec<&str> = base.iter().chain(extra).copied().collect();
            repl_data(&args).unwrap().outputcsv
        };
        assert!(!parse(&[]));
        assert!(parse(&["--outputcsv"]));
        assert!(parse(&["--outputcsv", "yes"]));
        assert!(parse(&["--outputcsv", "TRUE"]));
        assert!(!parse(&["--outputcsv", "0"]));
    }

    #[test]
    fn test_loglevel_and_verbose() {
        let base = ["--sqlite1", "a.db", "--sqlite2", "b.db"];
        let level = |extra: &[&str]| {
            let args: Vec<&str> = base.iter().chain(extra).copied().collect();
            sdiff(&args).unwrap().log_level()
        };
        assert_eq!(level(&[]), LogLevel::Critical);
        assert_eq!(level(&["--loglevel", "WARNING"]), LogLevel::Warning);
        assert_eq!(level(&["--verbose", "2"]), LogLevel::Debug);
        assert!(sdiff(&["--sqlite1", "a.db", "--sqlite2", "b.db", "--loglevel", "loud"]).is_err());
    }

    #[test]
    fn test_repl_data_options() {
        let config = repl_data(&[
            "--dbname",
            "ldapdb2",
            "--password",
            "secret",
            "--hostname",
            "ldap.example.com",
            "--port",
            "50001",
            "--replica",
            "replica1",
            "--output_file",
            "report.csv",
            "--outputcsv",
            "true",
        ])
        .unwrap()
        .into_config()
        .unwrap();

        assert_eq!(config.replica.as_deref(), Some("replica1"));
        assert_eq!(config.format, ReportFormat::Csv);
        assert_eq!(config.output_file, Some(PathBuf::from("report.csv")));
        let EndpointSource::Network(network) = &config.endpoint.source else {
            panic!("expected a network endpoint");
        };
        assert_eq!(network.target(), "ldap.example.com:50001/ldapdb2");
    }
}
