use std::process;

use afisha::scraper::WebScraper;
use afisha::types::EventRecord;
use afisha::{BASE_URL, Database};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "afisha")]
#[command(about = "An events.yandex.ru scraper", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        long,
        env = "AFISHA_SOURCE_URL",
        default_value = BASE_URL,
        global = true,
        help = "Page to scrape events from"
    )]
    source_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the current event list and print it
    List {
        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Scrape the current event list and reconcile it into the database
    Sync {
        #[arg(
            long,
            env = "AFISHA_DATABASE",
            default_value = "afisha.sqlite3",
            help = "SQLite database file"
        )]
        database: String,
    },
}

fn serialize_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn print_stats(events: &[EventRecord]) {
    let dated = events.iter().filter(|e| e.date.is_some()).count();
    println!(
        "\n{} event(s), {} dated, {} to be announced",
        events.len(),
        dated,
        events.len() - dated
    );
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let scraper = WebScraper::with_base_url(&cli.source_url).unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    });

    let events = scraper.fetch_events().await.unwrap_or_else(|e| {
        log::error!("Error fetching events: {}", e);
        process::exit(1);
    });

    match cli.command {
        Commands::List { format } => match format {
            OutputFormat::Json => serialize_json(&events),
            OutputFormat::Text => {
                if events.is_empty() {
                    println!("No events to display.");
                } else {
                    for (i, event) in events.iter().enumerate() {
                        println!("{:>3}. {}", i + 1, event);
                    }
                    print_stats(&events);
                }
            }
        },

        Commands::Sync { database } => {
            let mut db = Database::open(&database).unwrap_or_else(|e| {
                log::error!("Error opening database {}: {}", database, e);
                process::exit(1);
            });

            let report = db.sync_events(&events).unwrap_or_else(|e| {
                log::error!("Error syncing events: {}", e);
                process::exit(1);
            });

            println!("{}", report);
        }
    }
}
