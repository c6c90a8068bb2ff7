//! Shared monitor side-channel
//!
//! The server's monitor port accepts trainer commands (move agents or ball, change
//! play mode, ...). All agents hosted by one process share a single monitor socket:
//!
//! - the first agent to bootstrap opens it ([`MonitorHandle::open`]),
//! - every later agent receives a clone of the handle,
//! - the socket closes when the last handle is released or dropped.
//!
//! Ownership is `Rc`-counted, so the handle is deliberately `!Send`: the agents of a
//! process run on one thread.

use super::frame;
use crate::error::{Error, Result};
use crate::world::TeamSide;
use std::cell::RefCell;
use std::net::{Shutdown, TcpStream};
use std::rc::Rc;

struct MonitorLink {
    stream: RefCell<TcpStream>,
    addr: String,
}

impl Drop for MonitorLink {
    fn drop(&mut self) {
        log::info!("Closing monitor link to {}", self.addr);
        let _ = self.stream.get_mut().shutdown(Shutdown::Both);
    }
}

/// Reference-counted handle to the process-wide monitor socket
#[derive(Clone)]
pub struct MonitorHandle {
    link: Rc<MonitorLink>,
}

impl MonitorHandle {
    /// Open the monitor socket (done once per process)
    pub fn open(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        log::info!("Connecting to server's monitor port at {}", addr);
        let stream = TcpStream::connect(addr.as_str()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                Error::ConnectionRefused { addr: addr.clone() }
            } else {
                Error::Io(e)
            }
        })?;
        Ok(Self::from_stream(stream, addr))
    }

    /// Wrap an already connected monitor stream
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("Failed to set TCP_NODELAY on monitor link: {}", e);
        }
        Self {
            link: Rc::new(MonitorLink {
                stream: RefCell::new(stream),
                addr,
            }),
        }
    }

    /// Number of live handles (agents still holding the link)
    pub fn holders(&self) -> usize {
        Rc::strong_count(&self.link)
    }

    /// Give up this holder's share. Returns `true` if the socket was closed
    /// because this was the last holder.
    pub fn release(self) -> bool {
        let last = self.holders() == 1;
        drop(self);
        last
    }

    /// Send one raw monitor command as a frame
    pub fn send_command(&self, command: &str) -> Result<()> {
        log::debug!("monitor -> {}", command);
        let mut stream = self.link.stream.borrow_mut();
        frame::write_frame(&mut *stream, command.as_bytes())
    }

    // ========================================================================
    // Trainer commands
    // ========================================================================

    /// Place an agent anywhere in 3D (unofficial beam)
    pub fn move_agent(
        &self,
        unum: u8,
        side: TeamSide,
        position: [f32; 3],
        rotation_deg: f32,
    ) -> Result<()> {
        self.send_command(&format!(
            "(agent (unum {}) (team {}) (move {} {} {} {}))",
            unum,
            side.monitor_name(),
            position[0],
            position[1],
            position[2],
            rotation_deg
        ))
    }

    /// Place the ball with an initial velocity
    pub fn move_ball(&self, position: [f32; 3], velocity: [f32; 3]) -> Result<()> {
        self.send_command(&format!(
            "(ball (pos {} {} {}) (vel {} {} {}))",
            position[0], position[1], position[2], velocity[0], velocity[1], velocity[2]
        ))
    }

    /// Force a play mode by its server name (e.g. `PlayOn`)
    pub fn set_play_mode(&self, server_name: &str) -> Result<()> {
        self.send_command(&format!("(playMode {})", server_name))
    }

    /// Overwrite the game clock
    pub fn set_game_time(&self, seconds: f32) -> Result<()> {
        self.send_command(&format!("(time {})", seconds))
    }

    /// Remove a player from the simulation
    pub fn kill_agent(&self, unum: u8, side: TeamSide) -> Result<()> {
        self.send_command(&format!(
            "(kill (unum {}) (team {}))",
            unum,
            side.monitor_name()
        ))
    }

    /// Shut the simulator down
    pub fn kill_sim(&self) -> Result<()> {
        self.send_command("(killsim)")
    }
}

impl std::fmt::Debug for MonitorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorHandle")
            .field("addr", &self.link.addr)
            .field("holders", &self.holders())
            .finish()
    }
}
