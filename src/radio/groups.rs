//! Fixed partition of the 22 players into three broadcast groups
//!
//! | group | members                              | ball |
//! |-------|--------------------------------------|------|
//! | 0     | teammates 10, 11 · opponents 7–11    | yes  |
//! | 1     | teammates 1–7                        | no   |
//! | 2     | teammates 8, 9 · opponents 1–6       | no   |

use crate::world::EntityRef::{self, Opponent as O, Teammate as T};

/// Players carried by one message type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastGroup {
    pub members: &'static [EntityRef],
    pub carries_ball: bool,
}

impl BroadcastGroup {
    /// Whether the agent with `unum` reports itself in this group
    pub fn includes_self(&self, unum: u8) -> bool {
        self.members.contains(&EntityRef::Teammate(unum))
    }
}

pub const GROUPS: [BroadcastGroup; 3] = [
    BroadcastGroup {
        members: &[T(10), T(11), O(7), O(8), O(9), O(10), O(11)],
        carries_ball: true,
    },
    BroadcastGroup {
        members: &[T(1), T(2), T(3), T(4), T(5), T(6), T(7)],
        carries_ball: false,
    },
    BroadcastGroup {
        members: &[T(8), T(9), O(1), O(2), O(3), O(4), O(5), O(6)],
        carries_ball: false,
    },
];
