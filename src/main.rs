//! khel-io - Team process for the 3D soccer simulation server
//!
//! Connects every configured player, bootstraps them in lock-step and keeps the
//! team stepping (perceive, broadcast, sync) until Ctrl-C or a fatal error.
//!
//! ```text
//! khel-io --config team.toml
//! khel-io --host 10.0.0.2 --unum 1 --unum 2 --robot-type 1
//! ```

use clap::Parser;
use khel_io::config::{AppConfig, PlayerConfig};
use khel_io::error::{Error, Result};
use khel_io::Team;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "khel-io")]
#[command(about = "Run soccer agents with perception and team radio")]
struct Args {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Server host
    #[arg(long)]
    host: Option<String>,

    /// Agent port
    #[arg(short, long)]
    port: Option<u16>,

    /// Monitor port (enables trainer commands)
    #[arg(short, long)]
    monitor_port: Option<u16>,

    /// Team name
    #[arg(short, long)]
    team: Option<String>,

    /// Uniform number; repeat to host several agents
    #[arg(short, long)]
    unum: Vec<u8>,

    /// Robot type for agents given with --unum
    #[arg(short, long, default_value_t = 0)]
    robot_type: u8,

    /// Fail immediately if the server is down instead of retrying
    #[arg(long)]
    no_wait: bool,
}

impl Args {
    fn into_config(self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };

        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.agent_port = port;
        }
        if self.monitor_port.is_some() {
            config.server.monitor_port = self.monitor_port;
        }
        if let Some(team) = self.team {
            config.team.name = team;
        }
        if !self.unum.is_empty() {
            config.team.players = self
                .unum
                .iter()
                .map(|&unum| PlayerConfig {
                    unum,
                    robot_type: self.robot_type,
                })
                .collect();
        }
        if self.no_wait {
            config.server.wait_for_server = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn run(config: &AppConfig, running: &AtomicBool) -> Result<()> {
    let mut team = Team::bootstrap(config)?;

    let mut result = Ok(());
    while running.load(Ordering::Relaxed) {
        if let Err(e) = team.step() {
            result = Err(e);
            break;
        }
    }

    log::info!("Shutting down {} agent(s)", team.len());
    team.shutdown();
    result
}

fn main() {
    let args = Args::parse();
    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("khel-io: {}", e);
            std::process::exit(2);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("khel-io v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Team {} with {} agent(s), server {}:{}",
        config.team.name,
        config.team.players.len(),
        config.server.host,
        config.server.agent_port
    );

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))
    {
        log::error!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(&config, &running) {
        log::error!("{}", e);
        if e.is_fatal() {
            eprintln!("khel-io: {}", e);
        }
        std::process::exit(1);
    }
    log::info!("khel-io stopped");
}
