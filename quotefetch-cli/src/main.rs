//! quotefetch CLI — download a price table and write it to a fixed CSV file.
//!
//! Shapes:
//! - `quotefetch AAPL` — ten years of daily rows → `stock_data.csv`
//! - `quotefetch AAPL 2020-01-01 2024-01-01` — daily rows in range → `stock_data.csv`
//! - `quotefetch AAPL --recent` — last 100 days → `historical_data.csv`
//! - `quotefetch AAPL --realtime` — today's one-minute rows → `minute_data.csv`
//! - `quotefetch --sp500 [start end]` — every S&P 500 constituent → `intraday_data.csv`
//!
//! Misuse prints the usage text and exits 0, as do fetch failures.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use quotefetch_core::data::{ConstituentPage, YahooProvider};
use quotefetch_core::procedure::USAGE;
use quotefetch_core::{Mode, ModeFlags, Procedure, ProviderConfig};
use std::future::Future;
use std::path::PathBuf;
use std::task::Poll;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "quotefetch",
    about = "Download daily or intraday price data to CSV",
    version
)]
struct Cli {
    /// <ticker> [start_date end_date], dates as YYYY-MM-DD.
    #[arg(value_name = "ARGS")]
    args: Vec<String>,

    /// Fetch today's one-minute bars into minute_data.csv.
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Fetch the last 100 days of daily bars into historical_data.csv.
    #[arg(long, default_value_t = false)]
    recent: bool,

    /// Fetch every S&P 500 constituent into intraday_data.csv.
    #[arg(long, default_value_t = false)]
    sp500: bool,

    /// Directory the output file is written to.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// TOML file overriding provider endpoints, user agent, or timeout.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level for stderr diagnostics (RUST_LOG takes precedence).
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn flags(&self) -> ModeFlags {
        ModeFlags {
            realtime: self.realtime,
            recent: self.recent,
            sp500: self.sp500,
        }
    }
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(_) => {
            println!("{USAGE}");
            return Ok(());
        }
    };

    init_logging(&cli.log_level);
    install_interrupt_handler()?;

    let mode = match Mode::classify(&cli.args, cli.flags()) {
        Ok(mode) => mode,
        Err(e) => {
            debug!(error = %e, args = ?cli.args, "rejected arguments");
            println!("{USAGE}");
            return Ok(());
        }
    };

    let config = match &cli.config {
        Some(path) => ProviderConfig::from_file(path)?,
        None => ProviderConfig::default(),
    };

    let provider = YahooProvider::new(&config).context("failed to build HTTP client")?;
    let constituents = ConstituentPage::new(&config).context("failed to build HTTP client")?;
    let today = chrono::Local::now().date_naive();

    let outcome = Procedure::new(&provider, &cli.output_dir, today)
        .with_symbol_source(&constituents)
        .run(&mode);
    debug!(?outcome, "run finished");

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("quotefetch={level},quotefetch_core={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Ctrl+C ends the process at once with status 0. The in-flight request is not
/// cancelled and a half-written file is left as is.
///
/// The OS handler is registered before this returns. Delivery of a real
/// signal is not exercised by the tests.
fn install_interrupt_handler() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;

    let mut interrupt = Box::pin(tokio::signal::ctrl_c());
    // First poll installs the handler; a pending result is the normal case.
    let first = runtime.block_on(std::future::poll_fn(|cx| {
        Poll::Ready(interrupt.as_mut().poll(cx))
    }));
    match first {
        Poll::Pending => {}
        Poll::Ready(Ok(())) => interrupted(),
        Poll::Ready(Err(e)) => return Err(e).context("failed to listen for Ctrl+C"),
    }

    std::thread::Builder::new()
        .name("interrupt".into())
        .spawn(move || {
            if runtime.block_on(interrupt).is_ok() {
                interrupted();
            }
        })
        .context("failed to spawn interrupt listener")?;

    Ok(())
}

fn interrupted() -> ! {
    println!("\nInterrupt received, shutting down...");
    std::process::exit(0)
}
