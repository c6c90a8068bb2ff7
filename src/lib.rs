//! khel-io - Perception and team radio link for simulated humanoid soccer agents
//!
//! This library connects agents to the 3D soccer simulation server, turns its
//! sensor messages into a world model and shares that model between teammates
//! over the 20-character `say` channel.
//!
//! ## Layers
//!
//! - [`connection`]: framed TCP link, monitor link and multi-agent bootstrap
//! - [`parser`]: depth-tracked sensor message parser
//! - [`world`]: sensor snapshot and per-entity belief state
//! - [`radio`]: broadcast codec and admission schedule
//! - [`agent`]: one player, and the team hosted by this process

pub mod agent;
pub mod config;
pub mod connection;
pub mod error;
pub mod parser;
pub mod radio;
pub mod world;

// Re-export commonly used types
pub use agent::{Agent, Team};
pub use config::AppConfig;
pub use error::{Error, Result};
