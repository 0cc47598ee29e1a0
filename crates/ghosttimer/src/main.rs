//! `ghosttimer` - CLI for the ghosttimer stopwatch.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time::Instant;

use ghosttimer::capture::SavedIndicator;
use ghosttimer::cli::{
    Cli, Command, ConfigCommand, ExportCommand, OutputFormat, RecordCommand, ViewCommand,
};
use ghosttimer::location::{ReplayProvider, UnavailableProvider};
use ghosttimer::session::{self, SessionConfig, SessionEvent};
use ghosttimer::wake_lock::NoWakeLock;
use ghosttimer::{
    classify, init_logging, Config, KeyValueStore, LocationProvider, RecordedSession, SampleLog,
    SqliteBackend,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Record(cmd) => handle_record(&config, &cmd).await,
        Command::View(cmd) => handle_view(&config, &cmd),
        Command::Export(cmd) => handle_export(&config, &cmd),
        Command::Compass(cmd) => {
            println!("{}", classify(Some(cmd.heading)));
            Ok(())
        }
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_backend(config: &Config) -> anyhow::Result<SqliteBackend> {
    let path = config.database_path();
    SqliteBackend::open(&path, config.storage.quota_bytes)
        .with_context(|| format!("opening store at {}", path.display()))
}

fn open_log(config: &Config) -> anyhow::Result<SampleLog> {
    Ok(SampleLog::new(
        KeyValueStore::new(open_backend(config)?),
        config.storage.sample_key.clone(),
    ))
}

async fn handle_record(config: &Config, cmd: &RecordCommand) -> anyhow::Result<()> {
    let provider: Arc<dyn LocationProvider> = match &cmd.track {
        Some(path) => Arc::new(
            ReplayProvider::from_path(path)
                .with_context(|| format!("loading track {}", path.display()))?,
        ),
        None => Arc::new(UnavailableProvider),
    };
    let log = Arc::new(Mutex::new(open_log(config)?));

    let session_config = SessionConfig::from(config);
    let mut indicator = SavedIndicator::new(session_config.saved_indicator);
    let (handle, mut events) =
        session::start(session_config, provider, Arc::new(NoWakeLock), log);

    let duration = cmd.duration.map(Duration::from_secs);
    let stop = async move {
        match duration {
            Some(limit) => tokio::select! {
                () = tokio::time::sleep(limit) => {}
                _ = tokio::signal::ctrl_c() => {}
            },
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    };
    tokio::pin!(stop);

    loop {
        tokio::select! {
            () = &mut stop => break,
            event = events.recv() => match event {
                Some(event) => render(&event, &mut indicator, cmd.dashboard),
                None => break,
            },
        }
    }

    let summary = handle.finish().await;
    while let Some(event) = events.recv().await {
        render(&event, &mut indicator, cmd.dashboard);
    }

    println!();
    println!("Stopped at {}", summary.elapsed);
    println!("Samples saved: {}", summary.samples_saved);
    Ok(())
}

fn render(event: &SessionEvent, indicator: &mut SavedIndicator, dashboard: bool) {
    let now = Instant::now();
    match event {
        SessionEvent::Tick(elapsed) => {
            let marker = if indicator.is_visible(now) { "  saved" } else { "       " };
            print!("\r{elapsed}{marker}");
            let _ = std::io::stdout().flush();
        }
        SessionEvent::SampleSaved(_) => indicator.mark(now),
        SessionEvent::Dashboard(snapshot) if dashboard => {
            let show = |v: Option<i64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
            println!(
                "\r{:>10.5} {:>10.5}  alt {:>6} ft  hdg {:>3} {:<3}  {:>3} mph  {:>3} kn",
                snapshot.latitude,
                snapshot.longitude,
                show(snapshot.altitude_feet),
                show(snapshot.heading),
                snapshot.direction,
                show(snapshot.speed_mph),
                show(snapshot.speed_knots),
            );
        }
        SessionEvent::Dashboard(_) => {}
        SessionEvent::SaveFailed(message) => eprintln!("\rSample not saved: {message}"),
        SessionEvent::Notice(message) => eprintln!("\r{message}"),
        SessionEvent::WakeLock(status) => {
            tracing::info!(%status, "Screen wake lock");
        }
    }
}

fn handle_view(config: &Config, cmd: &ViewCommand) -> anyhow::Result<()> {
    let session = RecordedSession::load(&open_log(config)?);

    match cmd.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(session.samples())?);
        }
        OutputFormat::Csv => match session.to_csv() {
            Ok(csv) => print!("{csv}"),
            Err(e) if e.is_no_data() => eprintln!("{e}"),
            Err(e) => return Err(e.into()),
        },
        OutputFormat::Table => {
            if session.is_empty() {
                eprintln!("{}", ghosttimer::Error::NoData);
                return Ok(());
            }
            let show = |v: Option<f64>| v.map_or_else(String::new, |v| v.to_string());
            println!(
                "{:>4}  {:>10}  {:>7}  {:>12}  {:>12}  {:>5}  Recorded",
                "ID", "Altitude", "Heading", "Latitude", "Longitude", "MPH"
            );
            for s in session.samples() {
                println!(
                    "{:>4}  {:>10}  {:>7}  {:>12}  {:>12}  {:>5}  {}",
                    s.sequence_id,
                    show(s.altitude),
                    show(s.heading),
                    s.latitude,
                    s.longitude,
                    show(s.speed_mph),
                    s.recorded_time().map_or_else(
                        || s.recorded_at.clone(),
                        |t| t.format("%Y-%m-%d %H:%M:%S").to_string()
                    )
                );
            }
        }
    }
    Ok(())
}

fn handle_export(config: &Config, cmd: &ExportCommand) -> anyhow::Result<()> {
    let session = RecordedSession::load(&open_log(config)?);
    let dir = cmd.output.clone().unwrap_or_else(|| config.export_dir());
    let name = cmd.name.as_deref().unwrap_or(&config.export.file_name);

    match session.export_to(&dir, name) {
        Ok(path) => {
            println!("Wrote {} samples to {}", session.len(), path.display());
            Ok(())
        }
        Err(e) if e.is_no_data() => {
            eprintln!("{e}");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("exporting to {}", dir.join(name).display())),
    }
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let backend = open_backend(config)?;
    let stats = backend.stats()?;
    let mut log = SampleLog::new(KeyValueStore::new(backend), config.storage.sample_key.clone());
    let available = log.is_available();
    let samples = log.count();

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "storage_available": available,
            "samples": samples,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("ghosttimer status");
        println!("-----------------");
        println!("Database:      {}", config.database_path().display());
        println!(
            "Storage:       {}",
            if available { "available" } else { "unavailable" }
        );
        println!("Samples:       {samples}");
        println!("Bytes used:    {}", stats.bytes_used);
        if stats.quota_bytes > 0 {
            println!("Quota:         {}", stats.quota_bytes);
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                print_config(config);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            validate_config(&path);
        }
    }
    Ok(())
}

fn print_config(config: &Config) {
    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("[Storage]");
    println!("  Database path:      {}", config.database_path().display());
    println!("  Sample key:         {}", config.storage.sample_key);
    println!("  Quota (bytes):      {}", config.storage.quota_bytes);
    println!();
    println!("[Stopwatch]");
    println!("  Tick interval (ms): {}", config.stopwatch.tick_interval_ms);
    println!("  Sampling offsets:   {:?}", config.stopwatch.sampling_offsets);
    println!(
        "  Legacy rollover:    {}",
        config.stopwatch.legacy_minute_rollover
    );
    println!();
    println!("[Location]");
    println!("  High accuracy:      {}", config.location.high_accuracy);
    println!("  Timeout (ms):       {}", config.location.capture_timeout_ms);
    println!();
    println!("[Export]");
    println!("  File name:          {}", config.export.file_name);
    println!("  Directory:          {}", config.export_dir().display());
}

fn validate_config(path: &Path) {
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path.to_path_buf())) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => println!("Configuration error: {e}"),
    }
}
