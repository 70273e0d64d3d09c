use anyhow::Context;
use clap::{Parser, ValueEnum};
use inspectkit::{
    init_logging, Command, Config, LogFormat, ModuleController, SimStage, SimStageConfig,
    BUILD_DATE, VERSION,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogStyle {
    Pretty,
    Json,
}

/// Drive the inspection instrument from operator commands on stdin
#[derive(Debug, Parser)]
#[command(name = "inspectkit", version)]
struct Args {
    /// Configuration file (TOML or JSON); defaults to the platform config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the capture buffer directory
    #[arg(long)]
    buffer_dir: Option<PathBuf>,

    /// Write the effective configuration to the config path and exit
    #[arg(long)]
    write_config: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogStyle::Pretty)]
    log_format: LogStyle,
}

fn load_config(args: &Args) -> anyhow::Result<(PathBuf, Config)> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };
    let mut config = Config::load_or_default(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    if let Some(dir) = &args.buffer_dir {
        config.storage.buffer_dir = dir.clone();
    }
    config.validate()?;
    Ok((path, config))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(match args.log_format {
        LogStyle::Pretty => LogFormat::Pretty,
        LogStyle::Json => LogFormat::Json,
    })?;
    tracing::info!("InspectKit {} (built {})", VERSION, BUILD_DATE);

    let (path, config) = load_config(&args)?;
    if args.write_config {
        config.save_to_file(&path)?;
        println!("{}", path.display());
        return Ok(());
    }

    let stage = SimStage::new(SimStageConfig {
        convention: config.machine.corexy,
        ..Default::default()
    });
    let controller = Arc::new(ModuleController::new(
        config,
        Arc::new(stage.motors()),
        Arc::new(stage.switches()),
        Arc::new(stage.camera()),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reporter = controller.status_reporter();
    let status_task = tokio::spawn(async move {
        reporter
            .run(
                Box::new(|snapshot| tracing::debug!("{}", snapshot.summary())),
                shutdown_rx,
            )
            .await;
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "status" => {
                println!("{}", serde_json::to_string(&controller.snapshot())?);
                continue;
            }
            _ => {}
        }

        let command: Command = match line.parse() {
            Ok(command) => command,
            Err(e) => {
                println!("error: {}", e);
                continue;
            }
        };
        let worker = controller.clone();
        match tokio::task::spawn_blocking(move || worker.dispatch(command)).await? {
            Ok(()) => println!("ok"),
            Err(e) => {
                tracing::warn!("Command rejected: {}", e);
                println!("error: {}", e);
            }
        }
    }

    tracing::info!("Shutting down");
    if controller.is_busy() {
        controller.dispatch(Command::Stop)?;
    }
    let worker = controller.clone();
    tokio::task::spawn_blocking(move || worker.wait_idle()).await?;

    shutdown_tx.send(true).ok();
    status_task.await?;
    Ok(())
}
