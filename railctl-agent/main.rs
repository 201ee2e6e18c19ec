use anyhow::Context;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use clap::{Parser, Subcommand};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use railctl::config::{self, PortSource, RailctlConfig, TrimSource};
use railctl::{RailError, RailMetricExporter, RailSet};
use railctl_raw::current_soc::{self, analog, system};
use railctl_raw::{Register, RegisterLayout};

/// sysexits.h EX_TEMPFAIL: the supervisor should retry later
const EXIT_TEMPFAIL: u8 = 75;

#[derive(Parser, Debug)]
#[command(name = "railctl")]
#[command(about = "Control SoC-internal LDO regulators")]
struct Args {
    #[arg(
        long,
        global = true,
        default_value = "allwinner,sun20i-d1-analog-ldos",
        help = "Rail set variant (match key), see `railctl variants`"
    )]
    variant: String,

    #[arg(
        long,
        global = true,
        help = "Use an in-process register file instead of /dev/mem"
    )]
    simulate: bool,

    #[arg(
        long,
        global = true,
        help = "Memory device to map registers from, repeat to list fallbacks in order"
    )]
    devmem: Vec<PathBuf>,

    #[arg(
        long,
        global = true,
        value_parser = parse_u64,
        help = "Physical base of the system control block (default: SoC syscon)"
    )]
    base: Option<u64>,

    #[arg(long, global = true, value_parser = parse_u64, help = "Size of the register window")]
    window: Option<u64>,

    #[arg(long, global = true, help = "nvmem device holding calibration cells")]
    nvmem: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_parser = parse_u64,
        help = "Byte offset of bg_trim inside the nvmem device"
    )]
    trim_offset: Option<u64>,

    #[arg(
        long,
        global = true,
        value_parser = parse_u64,
        help = "bg_trim value for --simulate (default: unprovisioned)"
    )]
    sim_trim: Option<u64>,

    #[arg(
        short,
        long,
        global = true,
        help = "Enable verbose logging (shows all register reads/writes)"
    )]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List known rail set variants
    Variants,
    /// List the rails of the variant and their ladders
    List {
        #[arg(long, help = "Print every selector and its voltage")]
        ladder: bool,
    },
    /// Show selector, voltage and enable state of every rail
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Program the lowest ladder voltage within MIN..=MAX (e.g. 1.8V, 1800mV)
    Set {
        rail: String,
        #[arg(value_parser = parse_uv)]
        min: u32,
        #[arg(value_parser = parse_uv)]
        max: Option<u32>,
    },
    Enable {
        rail: String,
    },
    Disable {
        rail: String,
    },
    /// Decode the registers used by the variant
    Dump,
    /// Export rail state as Prometheus metrics
    Serve {
        #[arg(long, help = "Address to serve /metrics on (default: 0.0.0.0:9108)")]
        listen: Option<SocketAddr>,
        #[arg(long, default_value_t = 1000, help = "Sampling interval in milliseconds")]
        interval_ms: u64,
    },
}

fn parse_u64(s: &str) -> std::result::Result<u64, String> {
    config::parse_number(s).map_err(|e| e.to_string())
}

fn parse_uv(s: &str) -> std::result::Result<u32, String> {
    config::parse_microvolts(s).map_err(|e| e.to_string())
}

fn format_uv(uv: u32) -> String {
    format!("{}.{:06} V", uv / 1_000_000, uv % 1_000_000)
}

fn build_config(args: &Args) -> anyhow::Result<RailctlConfig> {
    let mut config = if args.simulate {
        let trim = args
            .sim_trim
            .map(u8::try_from)
            .transpose()
            .context("--sim-trim must fit in one byte")?;
        let mut config = RailctlConfig::simulated(&args.variant);
        config.trim = TrimSource::Simulated(trim);
        config
    } else {
        RailctlConfig::hardware(&args.variant)
    };

    if let PortSource::DevMem {
        paths,
        base,
        window,
    } = &mut config.port
    {
        if !args.devmem.is_empty() {
            *paths = args.devmem.clone();
        }
        if let Some(b) = args.base {
            *base = b;
        }
        if let Some(w) = args.window {
            *window = usize::try_from(w).context("--window too large")?;
        }
    }

    if let TrimSource::Nvmem { path, offset } = &mut config.trim {
        if let Some(nvmem) = &args.nvmem {
            *path = nvmem.clone();
        }
        if let Some(o) = args.trim_offset {
            *offset = o;
        }
    }

    Ok(config)
}

fn print_variants() {
    for spec in current_soc::VARIANTS {
        let rails: Vec<&str> = spec.rails.iter().map(|r| r.name).collect();
        println!(
            "{:<36} {:<32} rails: {}{}",
            spec.match_key,
            spec.description,
            rails.join(", "),
            if spec.calibration.is_some() {
                " (calibrated)"
            } else {
                ""
            }
        );
    }
}

fn print_list(config: &RailctlConfig, ladder: bool) -> anyhow::Result<()> {
    let spec = config.spec()?;
    for rail in spec.rails {
        println!(
            "{:<8} supply={:<8} {:<10} {} .. {} ({} codes) reg=0x{:03x} mask=0x{:08x} ops={}",
            rail.name,
            rail.supply_name,
            rail.ladder.name(),
            format_uv(rail.ladder.min_uv()),
            format_uv(rail.ladder.max_uv()?),
            rail.ladder.n_codes(),
            rail.vsel.offset,
            rail.vsel.mask,
            rail.capabilities().names().join(",")
        );
        if ladder {
            for (sel, uv) in rail.ladder.voltages() {
                println!("    {:>3}  {}", sel, format_uv(uv));
            }
        }
    }
    Ok(())
}

fn print_status(set: &RailSet, json: bool) -> anyhow::Result<()> {
    let status = set.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    for s in status {
        let voltage = s
            .voltage_uv
            .map(format_uv)
            .unwrap_or_else(|| "invalid".to_string());
        let enabled = match s.enabled {
            Some(true) => "on",
            Some(false) => "off",
            None => "always-on",
        };
        println!(
            "{:<8} supply={:<8} sel={:<3} {:<14} {}",
            s.name, s.supply, s.selector, voltage, enabled
        );
    }
    Ok(())
}

fn print_layout<T: RegisterLayout + Default + std::fmt::Debug>(offset: u32, word: u32) {
    let mut reg = Register::<T>::with_offset(offset);
    reg.from_reg_value(word);
    println!("    {:?}", reg.layout);
    if let Err(e) = reg.validate() {
        println!("    warning: {e}");
    }
}

fn dump_registers(set: &RailSet) -> anyhow::Result<()> {
    let port = set.port();
    let mut offsets: Vec<u32> = set
        .spec()
        .rails
        .iter()
        .flat_map(|rail| rail.fields())
        .map(|field| field.offset)
        .collect();
    offsets.sort_unstable();
    offsets.dedup();

    for offset in offsets {
        let word = port.read(offset)?;
        println!("0x{offset:03x} = 0x{word:08x}");

        match offset {
            analog::reg::SUN20I_POWER_REG => {
                print_layout::<analog::AnalogPowerControl>(offset, word)
            }
            system::reg::SUN20I_SYS_LDO_CTRL_REG => {
                print_layout::<system::SystemLdoControl>(offset, word)
            }
            _ => {}
        }
    }
    Ok(())
}

async fn metrics_handler(State(exporter): State<Arc<RailMetricExporter>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    let metric_families = exporter.registry().gather();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode rail metrics: {}", e);
    }

    let content_type = encoder.format_type().to_string();
    (
        [("Content-Type", content_type)],
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::warn!("Shutdown triggered by Ctrl+C"),
        _ = terminate => tracing::warn!("Shutdown triggered by SIGTERM"),
    }

    cancel_token.cancel();
}

async fn serve(set: RailSet, listen: SocketAddr, interval: Duration) -> anyhow::Result<()> {
    let exporter = Arc::new(RailMetricExporter::new(Arc::new(set))?);
    exporter.collect();

    let cancel_token = CancellationToken::new();
    let collection_handle = exporter.start(interval, cancel_token.clone());

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::clone(&exporter));

    tracing::warn!("Starting HTTP server on {}", listen);
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {listen}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
        .await?;

    cancel_token.cancel();
    let _ = collection_handle.await;
    tracing::info!("Server shutdown complete");

    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = build_config(&args)?;

    match args.command {
        Command::Variants => {
            print_variants();
            Ok(())
        }
        Command::List { ladder } => print_list(&config, ladder),
        command => {
            let set = config
                .bring_up()
                .with_context(|| format!("Failed to bring up {}", config.variant))?;

            match command {
                Command::Status { json } => print_status(&set, json),
                Command::Set { rail, min, max } => {
                    let rail = set.rail(&rail)?;
                    let selector = rail.set_voltage(min, max.unwrap_or(u32::MAX))?;
                    println!(
                        "{}: selector {} ({})",
                        rail.name(),
                        selector,
                        format_uv(rail.list_voltage(selector)?)
                    );
                    Ok(())
                }
                Command::Enable { rail } => Ok(set.rail(&rail)?.enable()?),
                Command::Disable { rail } => Ok(set.rail(&rail)?.disable()?),
                Command::Dump => dump_registers(&set),
                Command::Serve {
                    listen,
                    interval_ms,
                } => {
                    let listen = listen.unwrap_or(config.listen);
                    serve(set, listen, Duration::from_millis(interval_ms)).await
                }
                Command::Variants | Command::List { .. } => Ok(()),
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            let retryable = e
                .chain()
                .filter_map(|cause| cause.downcast_ref::<RailError>())
                .any(RailError::is_retryable);
            if retryable {
                ExitCode::from(EXIT_TEMPFAIL)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
