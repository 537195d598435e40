use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use common::{
    config::Config,
    measurement::{read_measurements, summarize},
    record::{read_records, write_records},
};
use eyre::{Context, Result};
use tokio::fs::{read_to_string, write};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const MODULES: &[&str] = &["common", "store_performance"];

#[derive(Parser)]
#[command(version, about = "Throughput charts for distributed store benchmarks")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[arg(short, long)]
    log: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the report charts to pdf (the default)
    Plot {
        /// Throughput table
        #[arg(short, long, default_value = "data.csv")]
        input: PathBuf,
        /// Directory for the pdfs
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// Report config, the built-in report when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Convert raw write/read timings into a throughput table
    Summarize {
        #[arg(short, long, default_value = "measurements.csv")]
        input: PathBuf,
        #[arg(short, long, default_value = "data.csv")]
        output: PathBuf,
    },
    /// Print the effective report config
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Plot {
            input: PathBuf::from("data.csv"),
            output: PathBuf::from("."),
            config: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let args = Cli::parse();
    let file_appender = tracing_appender::rolling::never(".", "log.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let mut env_filter = EnvFilter::new(format!("store_report={log_level}"));

    for log in &args.log {
        env_filter = env_filter.add_directive(log.parse()?);
    }

    for module in MODULES {
        if !args.log.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(layer().with_writer(non_blocking))
        .init();

    let result = match args.command.unwrap_or_default() {
        Commands::Plot {
            input,
            output,
            config,
        } => plot(&input, &output, config.as_deref()).await,
        Commands::Summarize { input, output } => summarize_measurements(&input, &output).await,
        Commands::Config { config } => print_config(config.as_deref()).await,
    };
    if let Err(err) = result {
        error!("{err:#?}");
        return Err(err);
    }
    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_yaml(
            &read_to_string(path)
                .await
                .wrap_err_with(|| format!("Read {}", path.display()))?,
        ),
        None => store_performance::default_config(),
    }
}

async fn plot(input: &Path, output: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config).await?;
    let data = read_to_string(input)
        .await
        .wrap_err_with(|| format!("Read {}", input.display()))?;
    let records =
        read_records(data.as_bytes()).wrap_err_with(|| format!("Parse {}", input.display()))?;
    info!("Loaded {} records from {}", records.len(), input.display());

    for path in common::plot::plot(&config, &records, output).await? {
        println!("{}", path.display());
    }
    Ok(())
}

async fn summarize_measurements(input: &Path, output: &Path) -> Result<()> {
    let data = read_to_string(input)
        .await
        .wrap_err_with(|| format!("Read {}", input.display()))?;
    let measurements = read_measurements(data.as_bytes())
        .wrap_err_with(|| format!("Parse {}", input.display()))?;
    let records = summarize(&measurements)?;

    let mut table = Vec::new();
    write_records(&mut table, &records)?;
    write(output, table)
        .await
        .wrap_err_with(|| format!("Write {}", output.display()))?;
    info!("Wrote {} rows to {}", records.len(), output.display());
    Ok(())
}

async fn print_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path).await?;
    print!("{}", config.to_yaml()?);
    Ok(())
}
