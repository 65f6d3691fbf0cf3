use tracing_subscriber::EnvFilter;

use crate::args::LogFormat;

/// Builds the tracing filter from `RUST_LOG`, then applies `-q`/`-v` as an override on top
/// (spec.md §6 ambient additions): `-q` forces `warn`, each `-v` drops the default down a
/// level from `info`.
pub fn init(quiet: bool, verbose: u8, format: LogFormat) {
    let default_directive = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}
