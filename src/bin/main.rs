use clap::Parser;
use std::path::PathBuf;

use apt_tlog::RelayConfig;

/// apt transport method verifying InRelease files against spicy signatures
#[derive(Parser)]
#[command(name = "tlog")]
#[command(version)]
#[command(
    about = "apt transport method verifying InRelease files against spicy signatures",
    long_about = "apt transport method verifying InRelease files against spicy signatures.\n\n\
                  apt runs this method without arguments; it relays the method protocol \
                  to the https method and verifies every downloaded InRelease file."
)]
struct Cli {
    /// Configuration file (default: $APT_TLOG_CONFIG, then /etc/apt/tlog.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Child transport method (default: the https method next to this executable)
    #[arg(long)]
    child: Option<PathBuf>,

    /// Debug log file; an empty value disables file logging
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match RelayConfig::discover(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(child) = cli.child {
        config.child_method = Some(child);
    }
    if let Some(log_file) = cli.log_file {
        config.log_file = Some(log_file);
    }

    apt_tlog::logging::init(config.log_file());

    let argv0 = std::env::args_os().next();
    let code = match apt_tlog::run(&config, argv0.as_deref()).await {
        Ok(outcome) => {
            log::debug!(
                target: "apt_tlog::shutdown",
                "Relay finished: {:?}, child exit {:?}",
                outcome.report,
                outcome.child_status
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    // A task blocked reading stdin would keep the runtime from shutting down.
    std::process::exit(code);
}
