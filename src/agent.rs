//! Agents and the co-located team
//!
//! An [`Agent`] bundles everything one player needs to take part in the match:
//!
//! ```text
//!              ┌──────────────── Agent ────────────────┐
//! server  ◄──► │ Connection ──► SensorParser ──► World  │
//!              │      ▲                         │       │
//!              │      └────── Radio ◄───────────┘       │
//!              └────────────────────────────────────────┘
//! ```
//!
//! A [`Team`] hosts several agents in one process. They bootstrap one after the
//! other (earlier agents keep the server stepping while a new one joins), share a
//! single monitor link and then run in lock-step: every agent sends, then every
//! agent receives.

use crate::config::{AppConfig, PlayerConfig, RadioConfig};
use crate::connection::bootstrap::{init_command, scene_command};
use crate::connection::{Connection, LockstepPeer, MonitorHandle, handshake};
use crate::error::{Error, Result};
use crate::parser::SensorParser;
use crate::radio::Radio;
use crate::radio::alphabet::MAX_MESSAGE_LEN;
use crate::world::{TeamSide, WorldModel};

/// Upper bound on drain-and-apply rounds per receive
const MAX_RECEIVE_ROUNDS: usize = 4;

/// One player connected to the server
pub struct Agent {
    unum: u8,
    robot_type: u8,
    connection: Connection,
    parser: SensorParser,
    world: WorldModel,
    radio: Radio,
    monitor: Option<MonitorHandle>,
}

impl Agent {
    /// Connect a player to the agent port
    pub fn connect(
        config: &AppConfig,
        player: &PlayerConfig,
        monitor: Option<MonitorHandle>,
    ) -> Result<Self> {
        let connection = Connection::connect(
            &config.server.host,
            config.server.agent_port,
            config.server.wait_for_server,
        )?;
        Self::with_connection(connection, &config.team.name, player, &config.radio, monitor)
    }

    /// Build an agent around an established connection
    pub fn with_connection(
        connection: Connection,
        team_name: &str,
        player: &PlayerConfig,
        radio: &RadioConfig,
        monitor: Option<MonitorHandle>,
    ) -> Result<Self> {
        Ok(Self {
            unum: player.unum,
            robot_type: player.robot_type,
            connection,
            parser: SensorParser::new(team_name, player.unum),
            world: WorldModel::new(team_name, player.unum),
            radio: Radio::new(radio)?,
            monitor,
        })
    }

    pub fn robot_type(&self) -> u8 {
        self.robot_type
    }

    pub fn world(&self) -> &WorldModel {
        &self.world
    }

    /// Mutable world access for the localizer and behaviors
    pub fn world_mut(&mut self) -> &mut WorldModel {
        &mut self.world
    }

    pub fn radio(&self) -> &Radio {
        &self.radio
    }

    pub fn monitor(&self) -> Result<&MonitorHandle> {
        self.monitor.as_ref().ok_or(Error::MonitorUnavailable)
    }

    /// Parse one frame, hand teammate broadcasts to the radio, advance the world.
    pub fn apply_frame(&mut self, frame: &[u8]) {
        let now = self.world.time_local_ms;
        self.parser.parse(frame, &mut self.world.snapshot, now);

        let heard = std::mem::take(&mut self.world.snapshot.heard);
        for msg in &heard {
            if !msg.is_own() && msg.payload.len() <= MAX_MESSAGE_LEN {
                self.radio.receive(&msg.payload, &mut self.world);
            }
        }
        self.world.snapshot.heard = heard;

        self.world.update();
    }

    /// Commit this step's broadcast and send the command queue.
    ///
    /// Returns `false` when the queue was dropped because a newer frame arrived.
    pub fn send_cycle(&mut self) -> Result<bool> {
        if let Some(msg) = self.radio.broadcast(&self.world) {
            self.connection.commit_announcement(msg.as_bytes());
        }
        self.connection.send()
    }

    /// One full cycle for a single agent: send, then receive.
    pub fn step(&mut self) -> Result<()> {
        self.send_cycle()?;
        self.receive_and_apply()
    }

    fn report_lost_packets(&self, frames: usize) {
        let Some(level) = lost_packet_level(frames) else {
            return;
        };
        let lost = frames - 1;
        if lost == 1 {
            log::log!(
                level,
                "[step {}] Agent {}: lost 1 packet, is the server overloaded?",
                self.world.snapshot.step,
                self.unum
            );
        } else {
            log::log!(
                level,
                "[step {}] Agent {}: lost {} consecutive packets, possible desync",
                self.world.snapshot.step,
                self.unum,
                lost
            );
        }
    }

    /// Close the socket and release the monitor share.
    ///
    /// Returns `true` if this agent was the last monitor holder.
    pub fn close(self) -> bool {
        self.connection.close();
        self.monitor.is_some_and(MonitorHandle::release)
    }
}

impl LockstepPeer for Agent {
    fn connection(&mut self) -> &mut Connection {
        &mut self.connection
    }

    /// Drain, apply, re-check; bounded so a flooding server cannot starve the caller
    fn receive_and_apply(&mut self) -> Result<()> {
        for _ in 0..MAX_RECEIVE_ROUNDS {
            let frames = self.connection.drain_available()?;
            self.report_lost_packets(frames.len());
            for frame in &frames {
                self.apply_frame(frame.as_bytes());
            }
            if !self.connection.has_pending()? {
                return Ok(());
            }
        }
        log::warn!(
            "[step {}] Agent {} still has data after {} receive rounds",
            self.world.snapshot.step,
            self.unum,
            MAX_RECEIVE_ROUNDS
        );
        Ok(())
    }

    fn try_receive_and_apply(&mut self) -> Result<bool> {
        match self.connection.poll_frame()? {
            Some(frame) => {
                self.apply_frame(frame.as_bytes());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn team_side(&self) -> Option<TeamSide> {
        self.world.team_side()
    }

    fn unum(&self) -> u8 {
        self.unum
    }
}

/// Severity for `frames` drained in one receive; more than one frame means
/// perceptions were skipped, more than two points at a desync
fn lost_packet_level(frames: usize) -> Option<log::Level> {
    match frames {
        0 | 1 => None,
        2 => Some(log::Level::Warn),
        _ => Some(log::Level::Error),
    }
}

/// Agents hosted by one process
#[derive(Default)]
pub struct Team {
    agents: Vec<Agent>,
}

impl Team {
    /// Connect and bootstrap every configured player in order.
    pub fn bootstrap(config: &AppConfig) -> Result<Self> {
        let monitor = match config.server.monitor_port {
            Some(port) => match MonitorHandle::open(&config.server.host, port) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::warn!("Continuing without monitor link: {}", e);
                    None
                }
            },
            None => None,
        };

        let mut team = Team::default();
        for player in &config.team.players {
            let agent = Agent::connect(config, player, monitor.clone())?;
            team.join(agent, &config.team.name)?;
        }
        drop(monitor);
        log::info!("{} agent(s) of team {} ready", team.len(), config.team.name);
        Ok(team)
    }

    /// Bootstrap `agent` while the agents already in the team keep stepping
    pub fn join(&mut self, mut agent: Agent, team_name: &str) -> Result<()> {
        log::info!("Bootstrapping agent {} (robot type {})", agent.unum, agent.robot_type);
        let scene = scene_command(agent.robot_type);
        let init = init_command(agent.unum, team_name);
        handshake(&mut agent, &mut self.agents, &scene, &init)?;
        self.agents.push(agent);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    /// Lock-step cycle: every agent sends, then every agent receives.
    pub fn step(&mut self) -> Result<()> {
        for agent in &mut self.agents {
            agent.send_cycle()?;
        }
        for agent in &mut self.agents {
            agent.receive_and_apply()?;
        }
        Ok(())
    }

    /// Close every agent; the last one closes the monitor link.
    pub fn shutdown(self) {
        for agent in self.agents {
            let unum = agent.unum;
            if agent.close() {
                log::info!("Agent {} closed the monitor link", unum);
            }
        }
    }
}
