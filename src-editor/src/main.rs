use clap::Parser;
use log::{error, LevelFilter};
use std::{process, str::FromStr};

use tessera_lib::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let log_level = LevelFilter::from_str(&cli.log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using 'warn' instead.", cli.log_level);
        LevelFilter::Warn
    });

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    if let Err(err) = tessera_lib::run(cli).await {
        error!(err:err; "Run failed");
        eprintln!("error: {err}");
        process::exit(1);
    }
}
