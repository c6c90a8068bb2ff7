//! Multi-agent startup handshake
//!
//! Several agents hosted by one process must join the server without any of them
//! stalling the others. In sync mode the server only advances once every connected
//! agent has sent `(syn)`, so a newly joining agent waiting on its own reply would
//! deadlock if its siblings stopped sending.
//!
//! # Sequence
//!
//! ```text
//! new agent                     siblings (already joined)
//! ─────────                     ────────────────────────
//! (scene ...)          ──►
//! poll own reply ◄─┐
//!    none?         │            each: (syn)
//!                  │            each: receive
//!                  └──────────  repeat until own reply arrives
//! (init ...)           ──►      (same async receive)
//!
//! x SYNC_ROUNDS:
//! (syn)                ──►      each: (syn)
//!                               each: receive
//! receive
//! ```
//!
//! The barrier rounds work around the server generating an extra cycle for late
//! joiners: a `(syn)` the server does not need is discarded, so repeating the
//! round is harmless and guarantees the team side has been announced.
//!
//! The async receive is the only place sockets are polled without blocking.

use super::{Connection, SYNC_COMMAND};
use crate::error::{Error, Result};
use crate::world::TeamSide;

/// Barrier rounds after init
pub const SYNC_ROUNDS: usize = 3;

/// An agent that takes part in the lock-step handshake
pub trait LockstepPeer {
    /// The agent's server connection
    fn connection(&mut self) -> &mut Connection;

    /// Blocking receive of everything available, applied to the agent's state
    fn receive_and_apply(&mut self) -> Result<()>;

    /// Apply a frame if one is already waiting; returns whether one was applied
    fn try_receive_and_apply(&mut self) -> Result<bool>;

    /// Field side announced by the server, once known
    fn team_side(&self) -> Option<TeamSide>;

    /// Uniform number, for diagnostics
    fn unum(&self) -> u8;
}

/// Bootstrap `agent` while keeping already joined `siblings` in lock-step.
pub fn handshake<P: LockstepPeer>(
    agent: &mut P,
    siblings: &mut [P],
    scene: &str,
    init: &str,
) -> Result<()> {
    let unum = agent.unum();

    agent.connection().send_immediate(scene.as_bytes())?;
    receive_async(agent, siblings)?;

    agent.connection().send_immediate(init.as_bytes())?;
    receive_async(agent, siblings)?;

    for round in 0..SYNC_ROUNDS {
        log::debug!("Agent {} barrier round {}", unum, round + 1);
        agent.connection().send_immediate(SYNC_COMMAND)?;
        for sibling in siblings.iter_mut() {
            sibling.connection().send_immediate(SYNC_COMMAND)?;
        }
        for sibling in siblings.iter_mut() {
            sibling.receive_and_apply()?;
        }
        agent.receive_and_apply()?;
    }

    match agent.team_side() {
        Some(side) => {
            log::info!("Agent {} joined on the {:?} side", unum, side);
            Ok(())
        }
        None => Err(Error::Handshake(format!(
            "server did not return a team side for agent {}, check the server terminal",
            unum
        ))),
    }
}

/// Wait for the agent's own reply while siblings keep the server stepping.
fn receive_async<P: LockstepPeer>(agent: &mut P, siblings: &mut [P]) -> Result<()> {
    if siblings.is_empty() {
        return agent.receive_and_apply();
    }

    let mut polls: u64 = 0;
    loop {
        if agent.try_receive_and_apply()? {
            break;
        }
        polls += 1;
        for sibling in siblings.iter_mut() {
            sibling.connection().send_immediate(SYNC_COMMAND)?;
        }
        for sibling in siblings.iter_mut() {
            sibling.receive_and_apply()?;
        }
    }
    log::debug!(
        "Agent {} async receive completed after {} sibling steps",
        agent.unum(),
        polls
    );
    Ok(())
}

/// Scene command selecting the heterogeneous robot model
pub fn scene_command(robot_type: u8) -> String {
    format!("(scene rsg/agent/nao/nao_hetero.rsg {})", robot_type)
}

/// Init command registering identity
pub fn init_command(unum: u8, team_name: &str) -> String {
    format!("(init (unum {}) (teamname {}))", unum, team_name)
}
