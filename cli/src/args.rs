use std::path::PathBuf;

use clap::Parser;

/// Declarative schema management for Postgres and SQLite.
#[derive(Debug, Parser)]
#[command(name = "dbterra", version, about, propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Raise the tracing filter to `warn`.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Raise tracing verbosity; repeatable (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Diff the desired-state file against the live database and apply the plan.
    Apply(ApplyArgs),
}

#[derive(Debug, Parser)]
pub struct ApplyArgs {
    /// Path to the desired-state SQL file.
    #[arg(short, long)]
    pub file: PathBuf,

    /// Database connection string; falls back to `DATABASE_URL`.
    #[arg(short, long, env = "DATABASE_URL")]
    pub url: String,

    /// Managed schema; repeatable.
    #[arg(short, long, default_values_t = vec!["public".to_string()])]
    pub schema: Vec<String>,

    /// Skip the destructive-operations confirmation prompt.
    #[arg(long)]
    pub auto_approve: bool,

    /// Print the plan and exit without touching the database.
    #[arg(long)]
    pub dry_run: bool,

    /// Advisory-lock name.
    #[arg(long, default_value = "dbterra_migrate_execute")]
    pub lock_name: String,

    /// Lock acquisition timeout, in seconds.
    #[arg(long, default_value_t = 10)]
    pub lock_timeout: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_requires_file_and_url() {
        let result = Cli::try_parse_from(["dbterra", "apply", "--url", "postgres://localhost/db"]);
        assert!(result.is_err());
    }

    #[test]
    fn apply_defaults_schema_to_public() {
        let cli = Cli::try_parse_from(["dbterra", "apply", "-f", "schema.sql", "-u", "postgres://localhost/db"])
            .unwrap();
        let Command::Apply(args) = cli.command;
        assert_eq!(args.schema, vec!["public".to_string()]);
        assert_eq!(args.lock_timeout, 10);
        assert!(!args.auto_approve);
        assert!(!args.dry_run);
    }

    #[test]
    fn schema_flag_is_repeatable() {
        let cli = Cli::try_parse_from([
            "dbterra",
            "apply",
            "-f",
            "schema.sql",
            "-u",
            "postgres://localhost/db",
            "-s",
            "public",
            "-s",
            "billing",
        ])
        .unwrap();
        let Command::Apply(args) = cli.command;
        assert_eq!(args.schema, vec!["public".to_string(), "billing".to_string()]);
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        let result =
            Cli::try_parse_from(["dbterra", "--quiet", "--verbose", "apply", "-f", "s.sql", "-u", "sqlite://d.db"]);
        assert!(result.is_err());
    }
}
