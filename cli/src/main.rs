mod args;
mod logging;

use std::process::ExitCode;

use args::{Cli, Command};
use clap::Parser;
use dbterra_core::{apply, ApplyOptions};
use migration_connector::ExecuteOptions;

const EXIT_SUCCESS: u8 = 0;
const EXIT_CORE_ERROR: u8 = 1;
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            err.print().ok();
            return ExitCode::from(if err.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS });
        }
    };

    logging::init(cli.quiet, cli.verbose, cli.log_format);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: could not start the async runtime: {err}");
            return ExitCode::from(EXIT_CORE_ERROR);
        }
    };

    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> ExitCode {
    let Command::Apply(args) = cli.command;

    let options = ApplyOptions {
        managed_schemas: args.schema,
        execute: ExecuteOptions {
            auto_approve: args.auto_approve,
            dry_run: args.dry_run,
            lock_name: args.lock_name,
            lock_timeout_seconds: args.lock_timeout,
        },
    };

    match apply(&args.file, &args.url, &options).await {
        Ok(report) => {
            tracing::info!(
                transactional_applied = report.transactional_applied,
                concurrent_applied = report.concurrent_applied,
                "apply finished"
            );
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(err) => {
            eprintln!("{}", dbterra_core::format_error(&err));
            ExitCode::from(EXIT_CORE_ERROR)
        }
    }
}
