use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use copterlink::config::{default_config_path, AppConfig};
use copterlink::console;
use copterlink::input::ControlVector;
use copterlink::session::ControlSession;
use copterlink::transport::CommandListener;
use std::path::PathBuf;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about)]
/// Remote control link for a WiFi quadcopter
struct Args {
    /// Config file to use instead of ~/.config/copterlink/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Drone host, overrides the config file
    #[arg(long)]
    host: Option<String>,

    /// Drone UDP port, overrides the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Clone, Debug)]
enum Mode {
    /// Fly from an interactive console on stdin
    Console,
    /// Receive and log commands like the drone would
    Listen {
        /// Address to bind the receiving socket to
        #[arg(short, long, default_value = "0.0.0.0:5005")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup(args.verbose)?;

    match args.mode.clone().unwrap_or(Mode::Console) {
        Mode::Console => run_console(&args).await,
        Mode::Listen { bind } => run_listener(&bind).await,
    }
}

async fn load_config(args: &Args) -> Result<AppConfig> {
    let path = args.config.clone().unwrap_or_else(default_config_path);
    let config = AppConfig::load_or_create(&path)
        .await?
        .with_overrides(args.host.clone(), args.port);
    config.validate()?;
    Ok(config)
}

async fn run_console(args: &Args) -> Result<()> {
    let config = load_config(args).await?;

    let (notice_tx, notice_rx) = mpsc::channel(16);
    let session = ControlSession::create(
        config.endpoint(),
        config.scheduler_settings(),
        config.joystick_geometry(),
    )
    .with_notices(notice_tx)
    .attach(ControlVector::centered())
    .map_err(|(e, _)| eyre!("Failed to attach control session: {}", e))?;

    let stdin = BufReader::new(tokio::io::stdin());
    let session = console::run(session, stdin, tokio::io::stdout(), Some(notice_rx))
        .await
        .map_err(|e| eyre!("Console failed: {}", e))?;

    info!(
        "Session to {} closed, motors {}",
        session.endpoint(),
        if session.power_on() { "still on" } else { "off" }
    );
    Ok(())
}

async fn run_listener(bind: &str) -> Result<()> {
    let listener = CommandListener::bind(bind)
        .await
        .map_err(|e| eyre!("Failed to bind listener: {}", e))?;
    info!("Listening for commands on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Listener stopped");
                return Ok(());
            }
            received = listener.recv() => match received {
                Ok((command, from)) => info!("{} from {}", command, from),
                Err(e) => warn!("Receive failed: {}", e),
            }
        }
    }
}

fn setup(verbose: bool) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env(if verbose { Level::DEBUG } else { Level::INFO });
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .pretty()
        .init();
}
