use std::path::PathBuf;

use clap::{ArgAction, Parser};
use fabstream::{
    controller_config, dry_run, firmware_from_settings, init_logging, Config, EventFilter,
    PrintController, BUILD_DATE, VERSION,
};

#[derive(Parser, Debug)]
#[command(
    name = "fabstream",
    version,
    about = "Stream a G-code job against a simulated device that acknowledges every line"
)]
struct Cli {
    /// G-code program to stream
    #[arg(value_name = "FILE")]
    job: PathBuf,

    /// Path to config TOML (defaults to the user config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Firmware dialect, overrides the config file
    #[arg(long, value_name = "NAME")]
    firmware: Option<String>,

    /// Log level (error|warn|info|debug|trace), overrides the config file
    #[arg(long = "log-level", value_name = "LEVEL")]
    log_level: Option<String>,

    /// Print events as JSON lines instead of the transmitted commands
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load_or_default()?,
    };
    if let Some(dialect) = cli.firmware {
        settings.firmware.dialect = dialect;
    }
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }
    settings.validate()?;

    init_logging(&settings.logging.level)?;
    tracing::info!("fabstream {} (built {})", VERSION, BUILD_DATE);

    let firmware = firmware_from_settings(&settings)?;
    let mut controller = PrintController::new(firmware, controller_config(&settings));

    if cli.json {
        controller.bus().subscribe(EventFilter::All, |event| {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("Failed to serialize event: {}", e),
            }
        });
    }

    let out = (!cli.json).then(std::io::stdout);
    let report = dry_run(
        &mut controller,
        &cli.job,
        settings.streaming.queue_capacity,
        out,
    )
    .await?;

    tracing::info!(
        "Sent {} commands, {:.1}% of {}, device {}",
        report.commands,
        report.percent,
        cli.job.display(),
        report.final_state
    );

    Ok(())
}
