use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cinema_rank::config::Config;
use cinema_rank::error::Error;
use cinema_rank::fetch::HttpTransport;
use cinema_rank::report::Report;
use cinema_rank::resolver::Diagnostic;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    if let Err(e) = init_logging(&config) {
        eprintln!("{e}");
    }

    let transport = match HttpTransport::new(config.timeout()) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}", Error::from(e));
            return ExitCode::FAILURE;
        }
    };

    println!("Fetching a webpage from Afisha.ru");
    let options = config.run_options();
    let listing = cinema_rank::fetch_listing(&transport, &options).await;

    match listing {
        Ok(entries) => {
            println!("Grabbing information about every movie.");
            let report =
                cinema_rank::rank_movies(&transport, entries, options.top, log_diagnostic).await;
            if let Report::Table(_) = report {
                let today = chrono::Local::now().format("%Y-%m-%d");
                println!("Top rated movies in Moscow cinemas, {today}");
            }
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(e @ Error::ListingUnavailable(_)) => {
            tracing::error!("{e}");
            eprintln!("Website Afisha.ru not found: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("Probably Afisha's layout has been changed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn log_diagnostic(title: &str, diagnostic: &Diagnostic) {
    if diagnostic.is_severe() {
        tracing::error!(movie = title, "{diagnostic}");
    } else {
        tracing::warn!(movie = title, "{diagnostic}");
    }
}

/// Diagnostics go to the log file so stdout carries only the report.
/// Falls back to stderr when the file can't be opened.
fn init_logging(config: &Config) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| Error::Logging(e.to_string()))?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file);

    match file {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init(),
        Err(e) => {
            eprintln!("Can't open {}: {e}; logging to stderr", config.log_file.display());
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
        }
    }
    .map_err(|e| Error::Logging(e.to_string()))
}
