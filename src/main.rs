mod auth;
mod config;
mod einvoice;
mod error;
mod invoice;
mod notify;
mod pipeline;
mod upload;
mod window;

use clap::Parser;
use std::path::PathBuf;
use time::Date;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use einvoice::EinvoiceClient;
use notify::PushoverNotifier;
use pipeline::RunSummary;
use upload::UploadClient;
use window::TriggerEvent;

#[derive(Parser, Debug)]
#[command(
    name = "tw-invoice-updater",
    about = "Sync carrier e-invoices to the upload backend and notify on new ones"
)]
struct Cli {
    /// TOML config file; the environment is used when omitted
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Fetch the calendar month N months back (0 = current month)
    #[arg(long, value_name = "N")]
    months: Option<u32>,

    /// First day of the window (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    start: Option<Date>,

    /// Last day of the window (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    end: Option<Date>,

    /// JSON trigger event with start_date / end_date / months
    #[arg(long, value_name = "PATH")]
    event: Option<PathBuf>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

fn parse_date(s: &str) -> Result<Date, String> {
    Date::parse(s, time::macros::format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

impl Cli {
    /// Flags override fields of the event file.
    fn trigger(&self) -> Result<TriggerEvent, Box<dyn std::error::Error>> {
        let mut event = match &self.event {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => TriggerEvent::default(),
        };
        if self.start.is_some() {
            event.start_date = self.start;
        }
        if self.end.is_some() {
            event.end_date = self.end;
        }
        if self.months.is_some() {
            event.months = self.months;
        }
        Ok(event)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // init tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.debug { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(filter)
        .init();

    match sync(&cli).await {
        Ok(summary) => {
            info!(
                fetched = summary.fetched,
                created = summary.created,
                updated = summary.updated,
                notified = summary.notified,
                "Sync finished"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Sync failed");
            Err(e)
        }
    }
}

/// Config, window and pipeline for one run.
async fn sync(cli: &Cli) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    let window = cli.trigger()?.resolve(window::today());
    info!(start = %window.start, end = %window.end, "Starting sync");

    let http = reqwest::Client::new();
    let provider = EinvoiceClient::new(http.clone(), &cfg.provider, &cfg.card);
    let mut backend = UploadClient::new(http.clone(), &cfg.upload);
    let notifier = PushoverNotifier::new(http, &cfg.pushover);

    Ok(pipeline::run(&provider, &mut backend, &notifier, window).await?)
}
