use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hipmem::config::SimConfig;
use hipmem::experiment::{self, Experiment};

fn main() -> ExitCode {
    // Logs go to stderr so the report on stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("help" | "--help" | "-h") => {
            print_help();
            ExitCode::SUCCESS
        }
        Some("config") => match SimConfig::default().to_json_pretty() {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{e}");
                ExitCode::FAILURE
            }
        },
        Some("run") => match run(&args[1..]) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{e}");
                ExitCode::FAILURE
            }
        },
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_help();
            ExitCode::from(2)
        }
    }
}

#[derive(Debug, Default)]
struct RunArgs {
    config: Option<String>,
    log: Option<String>,
}

fn parse_run_args(args: &[String]) -> Result<RunArgs, String> {
    let mut out = RunArgs::default();
    let mut it = args.iter();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--config" => {
                out.config = Some(it.next().ok_or("--config needs a path")?.clone());
            }
            "--log" => {
                out.log = Some(it.next().ok_or("--log needs a path")?.clone());
            }
            other => return Err(format!("unexpected argument: {other}")),
        }
    }
    Ok(out)
}

fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_run_args(args)?;

    let cfg = match &args.config {
        Some(path) => {
            info!("Config file: {path}");
            SimConfig::from_json_file(path)?
        }
        None => SimConfig::default(),
    };

    let exp = Experiment::new(cfg)?;
    let reports = exp.run()?;

    if let Some(path) = &args.log {
        let mut out = BufWriter::new(File::create(path)?);
        experiment::write_epoch_log(&mut out, &reports)?;
        info!("Epoch log written to {path}");
    }

    experiment::print_report(exp.config(), &reports);
    Ok(())
}

fn print_help() {
    println!("hipmem (phase-gated hippocampal paired-associate model)");
    println!("usage:");
    println!("  hipmem run [--config path.json] [--log epochs.jsonl]");
    println!("  hipmem config      print the default config as JSON");
    println!("  hipmem help");
    println!("env:");
    println!("  RUST_LOG=debug     more detailed logging");
}
