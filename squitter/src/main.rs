//! squitter: decode ADS-B extended squitters from capture files or a live feed.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use comfy_table::{Cell, Table};
use eyre::{bail, Result, WrapErr};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use squitter_core::config::{self, Config};
use squitter_core::{Coordinates, FrameRecord, Report, Session, SessionConfig};

mod feed;

#[derive(Parser)]
#[command(name = "squitter", version, about = "ADS-B extended squitter decoder")]
struct Cli {
    /// Config file (defaults to ~/.squitter/config.toml)
    #[arg(long, global = true, env = "SQUITTER_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    session: SessionArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `[session]` config section.
#[derive(Args)]
struct SessionArgs {
    /// Max seconds between an even and odd frame for global decoding
    #[arg(long, global = true)]
    pair_window: Option<f64>,

    /// Max age in seconds of a fix used as a local-decode reference
    #[arg(long, global = true)]
    reference_age: Option<f64>,

    /// Receiver location as LAT,LON, used for single-frame decoding
    #[arg(long, global = true, value_parser = parse_coords, allow_hyphen_values = true)]
    receiver: Option<Coordinates>,

    /// Reject extended squitters with a bad CRC
    #[arg(long, global = true)]
    require_crc: bool,
}

#[derive(Args)]
struct OutputArgs {
    /// Print each decoded message as a JSON object
    #[arg(long)]
    json: bool,

    /// Print a table of tracked aircraft at the end
    #[arg(short, long)]
    summary: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode hex frames from a file (`-` for stdin)
    Decode {
        /// File with one frame per line: hex, *hex; or hex;timestamp
        file: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Decode frames live from a dump1090 raw TCP feed
    Listen {
        /// Feed host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Feed port (overrides config)
        #[arg(long)]
        port: Option<u16>,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    debug!(?config, "effective configuration");

    match cli.command {
        Commands::Decode { file, output } => cmd_decode(&file, config.session, &output),
        Commands::Listen { host, port, output } => {
            let host = host.unwrap_or(config.feed.host);
            let port = port.unwrap_or(config.feed.port);
            cmd_listen(&host, port, config.session, &output).await
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => config::load_config_from(path)
            .wrap_err_with(|| format!("cannot load config {}", path.display()))?,
        None => config::load_config().wrap_err("cannot load config")?,
    };

    let args = &cli.session;
    if let Some(window) = args.pair_window {
        config.session.pair_window_secs = window;
    }
    if let Some(age) = args.reference_age {
        config.session.reference_max_age_secs = age;
    }
    if let Some(receiver) = args.receiver {
        config.session.receiver = Some(receiver);
    }
    if args.require_crc {
        config.session.require_crc = true;
    }
    Ok(config)
}

fn parse_coords(s: &str) -> Result<Coordinates, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got {s:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {e}"))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("bad longitude: {e}"))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(format!("position {lat},{lon} is off the globe"));
    }
    Ok(Coordinates::new(lat, lon))
}

fn cmd_decode(file: &Path, config: SessionConfig, output: &OutputArgs) -> Result<()> {
    let reader: Box<dyn BufRead> = if file == Path::new("-") {
        Box::new(io::stdin().lock())
    } else {
        let f = std::fs::File::open(file)
            .wrap_err_with(|| format!("cannot open {}", file.display()))?;
        Box::new(io::BufReader::new(f))
    };

    let mut session = Session::new(config);
    let mut timeline = feed::Timeline::default();

    for line in reader.lines() {
        let line = line.wrap_err("read failed")?;
        let Some((hex, ts)) = feed::clean_line(&line) else {
            continue;
        };
        let record = FrameRecord::new(hex, timeline.stamp(ts));
        let report = session.process_record(&record);
        emit(&report, output)?;
    }

    finish(&session, output);
    Ok(())
}

async fn cmd_listen(host: &str, port: u16, config: SessionConfig, output: &OutputArgs) -> Result<()> {
    let addr = format!("{host}:{port}");
    let stream = TcpStream::connect(&addr)
        .await
        .wrap_err_with(|| format!("cannot connect to {addr}"))?;
    info!(%addr, "connected to raw feed");

    let mut lines = BufReader::new(stream).lines();
    let mut session = Session::new(config);
    let started = Instant::now();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.wrap_err("feed read failed")? else {
                    info!("feed closed");
                    break;
                };
                let Some((hex, _)) = feed::clean_line(&line) else {
                    continue;
                };
                let report = session.process_hex(hex, started.elapsed().as_secs_f64());
                emit(&report, output)?;
            }
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
        }
    }

    finish(&session, output);
    Ok(())
}

/// Print one report. An internal decoder fault stops the run.
fn emit(report: &Report, output: &OutputArgs) -> Result<()> {
    if output.json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        println!("{report}");
    }

    if let Some(err) = report.error() {
        if err.is_internal() {
            bail!("internal decoder fault on {}: {err}", report.raw);
        }
    }
    Ok(())
}

fn finish(session: &Session, output: &OutputArgs) {
    let stats = session.stats();
    info!(
        frames = stats.frames,
        decoded = stats.decoded,
        failed = stats.failed,
        unclassified = stats.unclassified,
        global = stats.global_fixes,
        local = stats.local_fixes,
        inconsistent = stats.inconsistent_pairs,
        aircraft = session.tracks().len(),
        "session complete"
    );

    if output.summary {
        print_summary(session);
    }
}

/// Table of aircraft heard within the idle timeout of the last frame, most
/// recent first.
fn print_summary(session: &Session) {
    let cache = session.tracks();
    let now = cache
        .iter()
        .map(|t| t.last_seen)
        .fold(f64::NEG_INFINITY, f64::max);
    let tracks = cache.active(now);
    if tracks.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ICAO", "Callsign", "Alt (ft)", "Speed (kts)", "Hdg", "VRate", "Lat", "Lon", "Msgs",
    ]);

    for track in tracks {
        let position = track.position();
        table.add_row(vec![
            Cell::new(track.icao),
            Cell::new(track.callsign.as_deref().unwrap_or("-")),
            Cell::new(
                track
                    .altitude_ft
                    .map(|a| a.to_string())
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                track
                    .speed_kts
                    .map(|s| format!("{s:.0}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                track
                    .heading_deg
                    .map(|h| format!("{h:.1}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                track
                    .vertical_rate_fpm
                    .map(|v| format!("{v:+}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                position
                    .map(|p| format!("{:.4}", p.lat))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                position
                    .map(|p| format!("{:.4}", p.lon))
                    .unwrap_or("-".into()),
            ),
            Cell::new(track.messages),
        ]);
    }

    println!();
    println!("{table}");
}
