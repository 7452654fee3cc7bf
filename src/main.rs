mod cli;
mod error;
mod forecast;
mod frame;
mod join;
mod logging;
mod parquet;
mod reading;
mod sampling;
mod staging;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Error> {
    logging::init_tracing();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Outages { input_dir, output } => command::outages(input_dir, output).await,
        Commands::Weather(args) => command::weather(args).await,
    };

    match result {
        Ok(filename) => println!("File saved to `{}`", filename),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
