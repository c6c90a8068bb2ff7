//! Broadcast admission
//!
//! Every agent of a team runs the same schedule off the shared server clock, so at
//! any step all teammates agree on which group may be announced. A cycle of nine
//! 40 ms slots rotates through the three groups three times, with a growing
//! tolerance for missing players:
//!
//! ```text
//! slot      0 1 2 | 3 4 5 | 6 7 8
//! group     0 1 2 | 0 1 2 | 0 1 2
//! max MIA   0 0 0 | 1 1 1 | 2 2 2
//! ```
//!
//! Only one teammate's message is relayed per slot (the server picks one), so a
//! message is worth sending only when the sender has fresh data for the group.

use super::grid::PlayerReport;
use super::groups::{BroadcastGroup, GROUPS};
use crate::world::WorldModel;

/// Data older than this is not broadcast (ms)
pub const FRESH_WINDOW_MS: u64 = 40;

/// A player unseen for longer than this is missing in action (ms)
pub const MIA_WINDOW_MS: u64 = 370;

/// Schedule slot for the current server time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub group: usize,
    pub max_mia: usize,
}

impl Phase {
    pub fn at(server_time: f32) -> Self {
        let slot = ((server_time * 25.0 + 0.1).floor() as i64).rem_euclid(9) as usize;
        Self {
            group: slot % GROUPS.len(),
            max_mia: slot / 3,
        }
    }
}

/// Why the agent stays silent this slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    StaleBall,
    StaleSelf,
    TooManyMissing,
    NothingKnown,
    StaleMember,
}

/// Payload the agent may announce
#[derive(Debug, Clone, PartialEq)]
pub struct Admitted {
    pub group: usize,
    pub ball: Option<[f32; 2]>,
    pub players: Vec<PlayerReport>,
}

/// Decide whether `world` has fresh enough data to announce the current group.
pub fn admit(world: &WorldModel) -> Result<Admitted, Rejection> {
    let phase = Phase::at(world.snapshot.time_server);
    let group: &BroadcastGroup = &GROUPS[phase.group];
    let now = world.time_local_ms;

    let mut ball = None;
    if group.carries_ball {
        match world.ball.abs_pos {
            Some(pos) if world.ball.is_fresh(now, FRESH_WINDOW_MS) => ball = Some([pos[0], pos[1]]),
            _ => return Err(Rejection::StaleBall),
        }
    }

    let self_pos = world.self_loc.head_position;
    if group.includes_self(world.unum)
        && (self_pos.is_none() || !world.self_loc.is_fresh(now, FRESH_WINDOW_MS))
    {
        return Err(Rejection::StaleSelf);
    }

    let mut recent_mia = 0;
    let mut never_seen = Vec::with_capacity(group.members.len());
    let mut unknown = Vec::with_capacity(group.members.len());
    for &member in group.members {
        let is_self = world.is_self(member);
        let last = world.entity(member).and_then(|e| e.last_update_ms);
        let missing = !is_self && last.is_some_and(|t| t + MIA_WINDOW_MS < now);
        if missing {
            recent_mia += 1;
        }
        never_seen.push(!is_self && last.is_none());
        unknown.push(!is_self && (last.is_none() || missing));
    }

    if recent_mia > phase.max_mia {
        return Err(Rejection::TooManyMissing);
    }
    // Never-seen members only block the strictest tier, or when nobody else is known
    let any_never_seen = never_seen.iter().any(|&n| n);
    if (phase.max_mia == 0 && any_never_seen) || never_seen.iter().all(|&n| n) {
        return Err(Rejection::NothingKnown);
    }

    let mut players = Vec::with_capacity(group.members.len());
    for (&member, &is_unknown) in group.members.iter().zip(&unknown) {
        let report = if world.is_self(member) {
            match self_pos {
                Some(head) => PlayerReport::At {
                    pos: [head[0], head[1]],
                    fallen: head[2] < crate::world::FALLEN_HEAD_HEIGHT,
                },
                None => return Err(Rejection::StaleSelf),
            }
        } else if is_unknown {
            PlayerReport::Unknown
        } else {
            let Some(state) = world.entity(member) else {
                return Err(Rejection::StaleMember);
            };
            match state.abs_pos {
                Some(pos) if state.is_fresh(now, FRESH_WINDOW_MS) && state.has_full_position() => {
                    PlayerReport::At {
                        pos,
                        fallen: state.fallen,
                    }
                }
                _ => return Err(Rejection::StaleMember),
            }
        };
        players.push(report);
    }

    Ok(Admitted {
        group: phase.group,
        ball,
        players,
    })
}
