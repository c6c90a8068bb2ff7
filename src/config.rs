//! Configuration for khel-io agents
//!
//! Loads configuration from a TOML file. Every field has a default matching the
//! official 3D soccer simulation server, so an empty file is a valid config.
//!
//! # Configuration Hierarchy
//!
//! ```text
//! AppConfig
//! ├── ServerConfig      # host, agent/monitor ports, wait-for-server
//! ├── TeamConfig        # team name, co-located players (unum, robot type)
//! ├── RadioConfig       # broadcast grids (teammate, opponent, ball)
//! └── LoggingConfig     # env_logger default filter
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Highest uniform number on a team
pub const MAX_UNUM: u8 = 11;

/// Highest heterogeneous robot type accepted by the server
pub const MAX_ROBOT_TYPE: u8 = 4;

/// Largest number of grid steps along one axis; keeps player field
/// cardinalities (`2·lines·cols + 2`) within `u32`
pub const MAX_GRID_AXIS_STEPS: u32 = 20_000;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub team: TeamConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Simulation server endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server host name or IP
    #[serde(default = "default_host")]
    pub host: String,

    /// Agent port (one connection per agent)
    #[serde(default = "default_agent_port")]
    pub agent_port: u16,

    /// Monitor port (shared by all agents in this process); `None` disables it
    #[serde(default = "default_monitor_port")]
    pub monitor_port: Option<u16>,

    /// Keep retrying while the server refuses connections
    #[serde(default = "default_wait_for_server")]
    pub wait_for_server: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_agent_port() -> u16 {
    3100
}
fn default_monitor_port() -> Option<u16> {
    Some(3200)
}
fn default_wait_for_server() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            agent_port: default_agent_port(),
            monitor_port: default_monitor_port(),
            wait_for_server: default_wait_for_server(),
        }
    }
}

/// One agent hosted by this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlayerConfig {
    /// Uniform number (1-11)
    pub unum: u8,
    /// Heterogeneous robot type (0-4)
    #[serde(default)]
    pub robot_type: u8,
}

/// Team identity and co-located players
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TeamConfig {
    /// Team name sent at init and used to filter heard messages
    #[serde(default = "default_team_name")]
    pub name: String,

    /// Players bootstrapped by this process, in bootstrap order
    #[serde(default = "default_players")]
    pub players: Vec<PlayerConfig>,
}

fn default_team_name() -> String {
    "KhelFC".to_string()
}
fn default_players() -> Vec<PlayerConfig> {
    vec![PlayerConfig {
        unum: 1,
        robot_type: 0,
    }]
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            name: default_team_name(),
            players: default_players(),
        }
    }
}

/// Discretization grid for one broadcast field
///
/// The grid spans `[-half_length, half_length] x [-half_width, half_width]`
/// with the given number of cells per meter on each axis (both ends included).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GridConfig {
    pub half_length: f32,
    pub half_width: f32,
    pub cells_per_meter_x: f32,
    pub cells_per_meter_y: f32,
}

impl GridConfig {
    /// Teammate grid: 10 cm resolution over a 32 x 22 m area
    pub const fn teammate_defaults() -> Self {
        Self {
            half_length: 16.0,
            half_width: 11.0,
            cells_per_meter_x: 10.0,
            cells_per_meter_y: 10.0,
        }
    }

    /// Opponent grid: 16 x 20 cm resolution over a 32 x 22 m area
    pub const fn opponent_defaults() -> Self {
        Self {
            half_length: 16.0,
            half_width: 11.0,
            cells_per_meter_x: 6.25,
            cells_per_meter_y: 5.0,
        }
    }

    /// Ball grid: 10 cm resolution over the 30 x 20 m pitch
    pub const fn ball_defaults() -> Self {
        Self {
            half_length: 15.0,
            half_width: 10.0,
            cells_per_meter_x: 10.0,
            cells_per_meter_y: 10.0,
        }
    }

    /// Lines along x and columns along y, or `None` when the grid is degenerate
    /// or finer than [`MAX_GRID_AXIS_STEPS`] on either axis
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let axis = |half: f32, res: f32| -> Option<u32> {
            if !half.is_finite() || !res.is_finite() || half <= 0.0 || res <= 0.0 {
                return None;
            }
            let steps = (2.0 * f64::from(half) * f64::from(res)).round();
            (steps <= f64::from(MAX_GRID_AXIS_STEPS)).then(|| steps as u32 + 1)
        };
        Some((
            axis(self.half_length, self.cells_per_meter_x)?,
            axis(self.half_width, self.cells_per_meter_y)?,
        ))
    }

    fn validate(&self, what: &str) -> Result<()> {
        let values = [
            self.half_length,
            self.half_width,
            self.cells_per_meter_x,
            self.cells_per_meter_y,
        ];
        if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "{} grid must have positive spans and resolutions: {:?}",
                what, self
            )));
        }
        if self.dimensions().is_none() {
            return Err(Error::InvalidConfig(format!(
                "{} grid exceeds {} steps per axis: {:?}",
                what, MAX_GRID_AXIS_STEPS, self
            )));
        }
        Ok(())
    }
}

/// Broadcast codec grids
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RadioConfig {
    #[serde(default = "GridConfig::teammate_defaults")]
    pub teammate_grid: GridConfig,
    #[serde(default = "GridConfig::opponent_defaults")]
    pub opponent_grid: GridConfig,
    #[serde(default = "GridConfig::ball_defaults")]
    pub ball_grid: GridConfig,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            teammate_grid: GridConfig::teammate_defaults(),
            opponent_grid: GridConfig::opponent_defaults(),
            ball_grid: GridConfig::ball_defaults(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default env_logger filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use khel_io::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("khel.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Other(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check values the server would reject or the codec cannot represent
    pub fn validate(&self) -> Result<()> {
        let name = &self.team.name;
        if name.is_empty() || name.bytes().any(|b| b == b' ' || b == b'(' || b == b')') {
            return Err(Error::InvalidConfig(format!(
                "team name {:?} must be non-empty without spaces or parentheses",
                name
            )));
        }

        if self.team.players.is_empty() {
            return Err(Error::InvalidConfig("no players configured".to_string()));
        }

        let mut seen = [false; MAX_UNUM as usize + 1];
        for player in &self.team.players {
            if player.unum == 0 || player.unum > MAX_UNUM {
                return Err(Error::InvalidConfig(format!(
                    "uniform number {} outside 1-{}",
                    player.unum, MAX_UNUM
                )));
            }
            if player.robot_type > MAX_ROBOT_TYPE {
                return Err(Error::InvalidConfig(format!(
                    "robot type {} outside 0-{}",
                    player.robot_type, MAX_ROBOT_TYPE
                )));
            }
            if std::mem::replace(&mut seen[player.unum as usize], true) {
                return Err(Error::InvalidConfig(format!(
                    "uniform number {} configured twice",
                    player.unum
                )));
            }
        }

        self.radio.teammate_grid.validate("teammate")?;
        self.radio.opponent_grid.validate("opponent")?;
        self.radio.ball_grid.validate("ball")?;
        Ok(())
    }
}
