//! Wisconsin ensemble - main entry point

use clap::Parser;
use wisconsin_ensemble::cli::{cmd_info, cmd_predict, cmd_serve, cmd_train, cmd_validate, show_help, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wisconsin_ensemble=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Train { output_dir, test_size, random_state, hyperparameter_tuning, quick, verbose }) => {
            cmd_train(&output_dir, test_size, random_state, hyperparameter_tuning, quick, verbose).await?;
        }
        Some(Commands::Predict { features, model_dir, individual }) => {
            cmd_predict(&features, &model_dir, individual)?;
        }
        Some(Commands::Validate { feature, value }) => {
            cmd_validate(&feature, value)?;
        }
        Some(Commands::Info { stats }) => {
            cmd_info(stats).await?;
        }
        Some(Commands::Serve { port, host, model_dir }) => {
            cmd_serve(&host, port, &model_dir).await?;
        }
        None => show_help(),
    }

    Ok(())
}
