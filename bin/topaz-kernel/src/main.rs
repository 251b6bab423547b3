//! Topaz Kernel console driver
//!
//! Runs the kernel without a notebook front end: cells are read from stdin,
//! separated by blank lines, and their output is printed to stdout.

use std::env;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, error, info, warn};

use topaz_kernel::{ExecutionStatus, IopubMessage, KernelConfig, KernelInfo, TopazKernel};

/// Command line options
#[derive(Debug, Default)]
struct AppArgs {
    /// Configuration file path
    config_path: Option<PathBuf>,
    /// Enable debug logging
    debug: bool,
    /// Print kernel info and exit
    kernel_info: bool,
}

impl AppArgs {
    fn parse() -> anyhow::Result<Self> {
        let args: Vec<String> = env::args().collect();
        let mut app_args = AppArgs::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    if i + 1 < args.len() {
                        app_args.config_path = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    } else {
                        bail!("Missing config file path");
                    }
                }
                "--debug" | "-d" => app_args.debug = true,
                "--kernel-info" => app_args.kernel_info = true,
                "--help" | "-h" => {
                    print_help();
                    process::exit(0);
                }
                "--version" | "-V" => {
                    println!("topaz-kernel v{}", topaz_kernel::VERSION);
                    process::exit(0);
                }
                arg if arg.starts_with('-') => bail!("Unknown option: {}", arg),
                other => warn!("Ignoring positional argument: {}", other),
            }
            i += 1;
        }

        Ok(app_args)
    }
}

fn print_help() {
    println!("topaz-kernel - notebook kernel for the GemStone/S Topaz command line");
    println!();
    println!("USAGE:");
    println!("    topaz-kernel [OPTIONS]");
    println!();
    println!("Reads cells from stdin. A blank line ends a cell; Ctrl-C interrupts");
    println!("the running cell; end of input shuts the kernel down.");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>    Path to configuration file");
    println!("    -d, --debug            Enable debug logging");
    println!("        --kernel-info      Print kernel info as JSON and exit");
    println!("    -h, --help             Print this help message");
    println!("    -V, --version          Print version information");
    println!();
    println!("CONFIGURATION:");
    println!("    1. Path specified with --config");
    println!("    2. $TOPAZ_KERNEL_CONFIG");
    println!("    3. <config dir>/topaz-kernel/config.toml");
    println!("    4. ~/.topaz-kernel/config.toml");
    println!("    5. ./topaz-kernel.toml");
    println!("    6. Built-in defaults");
    println!();
    println!("ENVIRONMENT:");
    println!("    TOPAZ_KERNEL_DEBUG    Enable debug logging (1 or true)");
    println!("    RUST_LOG              Set logging level (error, warn, info, debug, trace)");
}

fn init_logging(debug: bool) {
    let debug = debug
        || env::var("TOPAZ_KERNEL_DEBUG").map_or(false, |v| v == "1" || v.eq_ignore_ascii_case("true"));
    let log_level = if debug { "debug" } else { "info" };

    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from(env_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_configuration(args: &AppArgs) -> anyhow::Result<KernelConfig> {
    let config = match &args.config_path {
        Some(path) => topaz_kernel::init_with_config(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => topaz_kernel::init().context("loading configuration")?,
    };
    Ok(config)
}

/// Print everything the kernel published for the last cell
fn print_messages(rx: &mut UnboundedReceiver<IopubMessage>) {
    let mut stdout = std::io::stdout().lock();
    while let Ok(message) = rx.try_recv() {
        let written = match message {
            IopubMessage::Stream(stream) if stream.text.is_empty() => Ok(()),
            IopubMessage::Stream(stream) if stream.text.ends_with('\n') => {
                write!(stdout, "{}", stream.text)
            }
            IopubMessage::Stream(stream) => writeln!(stdout, "{}", stream.text),
            IopubMessage::DisplayData(data) => {
                let mime = data.mime_type().unwrap_or("unknown");
                let size = data.data.values().map(String::len).sum::<usize>();
                writeln!(stdout, "[display_data: {}, {} bytes]", mime, size)
            }
            IopubMessage::Error(content) => writeln!(stdout, "[error: {}]", content.evalue),
        };
        if let Err(e) = written {
            debug!("stdout write failed: {}", e);
        }
    }
    let _ = stdout.flush();
}

async fn run_cell(
    kernel: &mut TopazKernel,
    rx: &mut UnboundedReceiver<IopubMessage>,
    cell: &str,
) -> anyhow::Result<()> {
    let result = kernel.execute(cell, false, true).await?;
    print_messages(rx);
    match result.status {
        ExecutionStatus::Ok => {}
        ExecutionStatus::Abort => eprintln!("[aborted]"),
        ExecutionStatus::Error => eprintln!(
            "[failed with {}]",
            result.error_value.as_deref().unwrap_or("?")
        ),
    }
    Ok(())
}

fn show_prompt(interactive: bool, count: u64) {
    if interactive {
        eprint!("In [{}]: ", count + 1);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = AppArgs::parse().unwrap_or_else(|e| {
        eprintln!("Failed to parse arguments: {}", e);
        print_help();
        process::exit(1);
    });

    init_logging(args.debug);
    debug!("Arguments: {:?}", args);

    let config = load_configuration(&args)?;

    if args.kernel_info {
        let info = KernelInfo::probe(&config.topaz).await;
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let (tx, mut rx) = unbounded_channel::<IopubMessage>();
    let mut kernel = match TopazKernel::start(config, Arc::new(tx)).await {
        Ok(kernel) => kernel,
        Err(e) => {
            error!("Failed to start Topaz: {}", e);
            process::exit(1);
        }
    };
    info!("Kernel ready (session {})", kernel.session().id());

    let interrupts = kernel.interrupt_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            interrupts.interrupt();
        }
    });

    let interactive = std::io::stdin().is_terminal();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut cell = String::new();

    show_prompt(interactive, kernel.execution_count());
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            if !cell.is_empty() {
                run_cell(&mut kernel, &mut rx, &cell).await?;
                cell.clear();
                show_prompt(interactive, kernel.execution_count());
            }
            continue;
        }
        if !cell.is_empty() {
            cell.push('\n');
        }
        cell.push_str(&line);
    }

    if !cell.is_empty() {
        run_cell(&mut kernel, &mut rx, &cell).await?;
    }

    kernel.shutdown(false).await?;
    info!("Kernel shut down");
    Ok(())
}
