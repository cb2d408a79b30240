use clap::Parser;
use promptq_worker::app;
use promptq_worker::config::{CliArgs, Command, WorkerConfig};
use promptq_worker::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    telemetry::init(args.log_format);

    let command = args.command.clone().unwrap_or(Command::Run);
    let config = WorkerConfig::try_from(args)?;

    match command {
        Command::Run => {
            app::run_worker(&config).await?;
        }
        Command::Seed(seed_args) => {
            app::run_seed(&config, &seed_args).await?;
        }
    }

    Ok(())
}
