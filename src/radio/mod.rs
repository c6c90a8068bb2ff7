//! Teammate broadcast channel
//!
//! Each step an agent may `say` up to 20 symbols, and the server relays one
//! teammate message per step to everyone in hearing range. The radio packs the
//! positions of a rotating group of players (and the ball) into those symbols and
//! merges what teammates report into the world model.
//!
//! ```text
//!            broadcast                                receive
//! WorldModel ─► scheduler::admit ─► codec::encode ─► (say ...)
//!                                                        │ server, one step later
//! WorldModel ◄─ freshness rules ◄── codec::decode ◄─ (hear ...)
//! ```

pub mod alphabet;
pub mod codec;
pub mod grid;
pub mod groups;
pub mod scheduler;
pub mod wide;

pub use codec::{DecodedMessage, EncodedMessage, RadioCodec};
pub use grid::PlayerReport;
pub use groups::{BroadcastGroup, GROUPS};
pub use scheduler::{Phase, Rejection};

use crate::config::RadioConfig;
use crate::error::Result;
use crate::world::{TrustSource, WorldModel, STEP_MS};
use scheduler::FRESH_WINDOW_MS;

/// Self-localization older than this is replaced by teammate reports (ms)
pub const SELF_STALE_MS: u64 = 110;

/// Broadcast codec plus the policies around it
#[derive(Debug, Clone)]
pub struct Radio {
    codec: RadioCodec,
}

impl Radio {
    pub fn new(config: &RadioConfig) -> Result<Self> {
        Ok(Self {
            codec: RadioCodec::new(config)?,
        })
    }

    pub fn codec(&self) -> &RadioCodec {
        &self.codec
    }

    /// Message to announce this step, if the current slot's data is fresh enough
    pub fn broadcast(&self, world: &WorldModel) -> Option<EncodedMessage> {
        let admitted = match scheduler::admit(world) {
            Ok(admitted) => admitted,
            Err(reason) => {
                log::trace!(
                    "[step {}] Agent {} stays silent: {:?}",
                    world.snapshot.step,
                    world.unum,
                    reason
                );
                return None;
            }
        };
        match self
            .codec
            .encode(admitted.group, admitted.ball, &admitted.players)
        {
            Ok(msg) => Some(msg),
            Err(e) => {
                log::error!("Agent {} failed to encode broadcast: {}", world.unum, e);
                None
            }
        }
    }

    /// Merge a teammate's message into `world`.
    ///
    /// Malformed payloads are logged and dropped; returns whether the message
    /// decoded.
    pub fn receive(&self, payload: &[u8], world: &mut WorldModel) -> bool {
        match self.codec.decode(payload) {
            Ok(msg) => {
                apply(&msg, world);
                true
            }
            Err(e) => {
                log::warn!(
                    "[step {}] Agent {} dropped broadcast {:?}: {}",
                    world.snapshot.step,
                    world.unum,
                    String::from_utf8_lossy(payload),
                    e
                );
                false
            }
        }
    }
}

/// Apply decoded reports, never overwriting fresher local knowledge.
fn apply(msg: &DecodedMessage, world: &mut WorldModel) {
    let now = world.time_local_ms;
    // sent during the previous step
    let msg_time = now.saturating_sub(STEP_MS);

    if let Some(ball) = msg.ball
        && !world.ball.is_fresh(now, FRESH_WINDOW_MS)
    {
        world.ball.observe(ball, msg_time, TrustSource::Radio);
    }

    for &(member, report) in &msg.players {
        let PlayerReport::At { pos, fallen } = report else {
            continue;
        };

        if world.is_self(member) {
            if !world.self_loc.is_fresh(now, SELF_STALE_MS) {
                let z = world.self_loc.head_position.map_or(0.0, |h| h[2]);
                world.self_loc.head_position = Some([pos[0], pos[1], z]);
                world.self_loc.radio_fallen = fallen;
                world.self_loc.radio_last_update_ms = Some(msg_time);
            }
            continue;
        }

        let Some(state) = world.entity_mut(member) else {
            continue;
        };
        if state.is_fresh(now, FRESH_WINDOW_MS) {
            continue;
        }
        state.observe(pos, None, fallen, msg_time, TrustSource::Radio);
    }
    log::trace!(
        "[step {}] Agent {} merged broadcast group {}",
        world.snapshot.step,
        world.unum,
        msg.group
    );
}
