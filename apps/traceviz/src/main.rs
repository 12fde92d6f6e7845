mod logging;
mod receipt;
mod view;

use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use traceviz_channel::{run_to_completion, WsChannel};
use traceviz_session::{
    hostname_hint, validate_submission, ChannelAdapter, Endpoints, SessionController,
};

use crate::receipt::{write_json, SessionReceipt};
use crate::view::{LivePrinter, UiOpts};

const DEFAULT_WIDTH: u16 = 80;

#[derive(Parser)]
#[command(name = "traceviz", version, about = "Stream a traceroute from a trace backend")]
struct Cli {
    /// Base url of the trace backend; session and visualization endpoints
    /// are derived from it.
    #[arg(long, global = true, env = "TRACEVIZ_SERVER", default_value = Endpoints::DEFAULT_BASE)]
    server: String,

    /// Disable colors and styling.
    #[arg(long, global = true)]
    plain: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Trace(TraceArgs),
    Interactive(InteractiveArgs),
}

#[derive(Args)]
#[command(about = "Trace one hostname and print hops as they arrive")]
struct TraceArgs {
    target: String,

    /// Visualization to reveal when the trace finishes: map, graph or both.
    #[arg(long)]
    viz: String,

    /// Write a JSON receipt of the finished session.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
#[command(
    about = "Read `<hostname> [map|graph|both]` lines from stdin; each line replaces the running trace"
)]
struct InteractiveArgs {
    /// Visualization used when a line names none.
    #[arg(long, default_value = "both")]
    viz: String,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let endpoints = Endpoints::from_base(&cli.server)
        .with_context(|| format!("invalid --server {:?}", cli.server))?;
    debug!(?endpoints, "resolved backend endpoints");

    let opts = UiOpts { plain: cli.plain };
    let width = crossterm::terminal::size()
        .map(|(cols, _)| cols)
        .unwrap_or(DEFAULT_WIDTH);
    let printer = LivePrinter::new(opts, width);

    match cli.command {
        Commands::Trace(args) => run_trace(args, endpoints, printer).await,
        Commands::Interactive(args) => run_interactive(args, endpoints, printer).await,
    }
}

async fn run_trace(args: TraceArgs, endpoints: Endpoints, mut printer: LivePrinter) -> Result<()> {
    let (target, preference) = validate_submission(&args.target, &args.viz)?;
    warn_hostname(&target);

    let (channel, mut events) = WsChannel::new();
    let mut controller = SessionController::new(channel, endpoints);
    let started_at_utc = now_utc();

    controller.submit(target, preference)?;
    printer.print(controller.session());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let finished = tokio::select! {
        _ = run_to_completion(&mut controller, &mut events, |session| printer.print(session)) => true,
        _ = &mut ctrl_c => false,
    };
    if !finished {
        info!("interrupted, closing channel");
        controller.interrupt();
        run_to_completion(&mut controller, &mut events, |session| printer.print(session)).await;
    }

    if let Some(path) = &args.out {
        let receipt = SessionReceipt::new(controller.session(), started_at_utc, now_utc());
        write_json(path, &receipt)?;
        info!(path = %path.display(), "wrote session receipt");
    }

    match controller.session().error() {
        Some(error) => Err(anyhow!("trace failed: {}", error.message)),
        None => Ok(()),
    }
}

async fn run_interactive(
    args: InteractiveArgs,
    endpoints: Endpoints,
    mut printer: LivePrinter,
) -> Result<()> {
    let (channel, mut events) = WsChannel::new();
    let mut controller = SessionController::new(channel, endpoints);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut interrupted = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    eprintln!("enter `<hostname> [map|graph|both]`, one per line; Ctrl-D quits after the running trace, Ctrl-C stops it");

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line.context("failed to read stdin")? {
                    Some(line) => submit_line(&mut controller, &line, &args.viz, &mut printer),
                    None => {
                        debug!("stdin closed, waiting for the running trace");
                        stdin_open = false;
                    }
                }
            }
            event = events.recv(), if !controller.is_settled() => {
                match event {
                    Some(event) => {
                        controller.handle_event(event);
                        printer.print(controller.session());
                    }
                    None => break,
                }
            }
            _ = &mut ctrl_c, if !interrupted => {
                info!("interrupted, closing channel");
                interrupted = true;
                stdin_open = false;
                controller.interrupt();
            }
        }

        if !stdin_open && controller.is_settled() {
            break;
        }
    }
    Ok(())
}

fn submit_line<A: ChannelAdapter>(
    controller: &mut SessionController<A>,
    line: &str,
    default_viz: &str,
    printer: &mut LivePrinter,
) {
    let mut parts = line.split_whitespace();
    let Some(target) = parts.next() else {
        return;
    };
    let viz = parts.next().unwrap_or(default_viz);

    match validate_submission(target, viz) {
        Ok((target, preference)) => {
            warn_hostname(&target);
            if let Err(err) = controller.submit(target, preference) {
                eprintln!("{err}");
                return;
            }
            printer.print(controller.session());
        }
        Err(err) => eprintln!("{err}"),
    }
}

fn warn_hostname(target: &str) {
    if let Some(hint) = hostname_hint(target) {
        eprintln!("warning: {hint} ({target:?})");
    }
}

fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
