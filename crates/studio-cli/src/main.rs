//! `studio` command-line front end.

mod cli;
mod commands;
mod printer;

use std::process::ExitCode;

use clap::Parser as _;
use studio_core::StudioConfig;
use studio_core::config::load_dotenv;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();
    studio_core::init_observability();
    let cli = Cli::parse();

    let config = match load_config(cli.api_url.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match commands::dispatch(cli.command, &config, cli.json).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(api_url: Option<&str>) -> Result<StudioConfig, studio_core::CoreError> {
    StudioConfig::from_lookup(|key| match (key, api_url) {
        ("STUDIO_API_BASE_URL", Some(url)) => Some(url.to_string()),
        _ => std::env::var(key).ok(),
    })
}
