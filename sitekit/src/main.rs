//! sitekit - Entry Point
//!
//! Dev server and deploy tooling for the learn platform static site.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process;

use colored::Colorize;
use tracing::{error, info};

use sitekit::deploy::deployer::{list_environment_backups, Deployer};
use sitekit::errors::SiteKitError;
use sitekit::filesys::file::File;
use sitekit::logs::{init_logging, LogOptions};
use sitekit::server::run_server;
use sitekit::settings::Settings;
use sitekit::utils::{format_size, version_info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut flags: HashMap<String, String> = HashMap::new();
    let mut positionals: Vec<String> = Vec::new();

    for arg in args.iter().skip(1) {
        if arg.starts_with("--") {
            if let Some((key, value)) = arg.split_once('=') {
                // Handle --key=value format
                flags.insert(key.trim_start_matches('-').to_string(), value.to_string());
            } else {
                // Handle standalone flags like --version
                flags.insert(arg.trim_start_matches('-').to_string(), "true".to_string());
            }
        } else {
            positionals.push(arg.clone());
        }
    }

    // Print version and exit
    if flags.contains_key("version") {
        let version = version_info();
        println!(
            "{}",
            serde_json::to_string_pretty(&version).unwrap_or_default()
        );
        return;
    }

    // Retrieve the settings file
    let settings_path = flags
        .get("config")
        .cloned()
        .unwrap_or_else(|| "sitekit.json".to_string());
    let mut settings = match Settings::load(&File::new(&settings_path)).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file {}: {}", settings_path, e);
            process::exit(1);
        }
    };

    if let Some(level) = flags.get("log-level") {
        match level.parse() {
            Ok(level) => settings.log_level = level,
            Err(e) => {
                eprintln!("{}", e);
                process::exit(1);
            }
        }
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: flags.contains_key("json-logs"),
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    let command = positionals.first().map(String::as_str).unwrap_or("help");
    let environment = positionals
        .get(1)
        .map(String::as_str)
        .unwrap_or("development");

    let result = match command {
        "serve" => serve_command(&mut settings, &flags).await,
        "deploy" => deploy_command(&settings, environment).await,
        "rollback" => rollback_command(&settings, environment).await,
        "list" => list_command(&settings, environment).await,
        "help" => {
            show_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            show_help();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

async fn serve_command(
    settings: &mut Settings,
    flags: &HashMap<String, String>,
) -> Result<(), SiteKitError> {
    if let Some(host) = flags.get("host") {
        settings.serve.host = host.clone();
    }
    if let Some(port) = flags.get("port") {
        settings.serve.port = port
            .parse()
            .map_err(|_| SiteKitError::ConfigError(format!("invalid port: {}", port)))?;
    }
    if let Some(root) = flags.get("root") {
        settings.serve.root = PathBuf::from(root);
    }
    if flags.contains_key("no-hot-reload") {
        settings.serve.hot_reload = false;
    }

    run_server(settings.serve.clone(), await_shutdown_signal()).await
}

async fn deploy_command(settings: &Settings, environment: &str) -> Result<(), SiteKitError> {
    let mut deployer = Deployer::new(&settings.deploy, environment)?;
    deployer.deploy().await
}

async fn rollback_command(settings: &Settings, environment: &str) -> Result<(), SiteKitError> {
    let deployer = Deployer::new(&settings.deploy, environment)?;
    deployer.rollback().await
}

async fn list_command(settings: &Settings, environment: &str) -> Result<(), SiteKitError> {
    let entries = list_environment_backups(&settings.deploy, environment).await?;

    if entries.is_empty() {
        println!("No backups found for {}", environment);
        return Ok(());
    }

    println!("{}", format!("Backups for {}:", environment).bold());
    for entry in entries {
        println!(
            "  {}  {}  {}",
            entry.name.cyan(),
            entry.captured_at.format("%Y-%m-%d %H:%M:%S UTC"),
            format_size(entry.size_bytes)
        );
    }

    Ok(())
}

fn show_help() {
    println!(
        r#"sitekit - dev server and deploy tooling

Usage:
  sitekit <command> [environment] [flags]

Commands:
  serve      Start the static dev server
  deploy     Deploy to the given environment
  rollback   Restore the latest backup for the given environment
  list       List backups for the given environment
  help       Show this help

Environments:
  development  (default)
  staging
  production

Flags:
  --config=<path>      Settings file (default: sitekit.json)
  --log-level=<level>  trace|debug|info|warn|error
  --json-logs          Log in JSON format
  --host=<host>        serve: listen host
  --port=<port>        serve: listen port
  --root=<dir>         serve: directory to serve
  --no-hot-reload      serve: disable hot reload
  --version            Print version info

Examples:
  sitekit serve --port=8080
  sitekit deploy production
  sitekit rollback production
  sitekit list production"#
    );
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
            let _ = tokio::signal::ctrl_c().await;
            info!("Ctrl+C received, shutting down...");
            return;
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
