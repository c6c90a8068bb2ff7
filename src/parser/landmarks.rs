//! Absolute positions of flags and goalposts
//!
//! Flag names are field-relative (`F1L` is always on the server's left half), while
//! the agent's coordinate frame puts its own goal at negative x. Playing on the
//! right side therefore mirrors every landmark through the field centre.

use crate::world::snapshot::LandmarkKind;
use crate::world::TeamSide;

type Landmark = (&'static str, LandmarkKind, [f32; 3]);

/// Positions when playing on the left side
const LEFT_SIDE: [Landmark; 8] = [
    ("F1L", LandmarkKind::Corner, [-15.0, 10.0, 0.0]),
    ("F2L", LandmarkKind::Corner, [-15.0, -10.0, 0.0]),
    ("F1R", LandmarkKind::Corner, [15.0, 10.0, 0.0]),
    ("F2R", LandmarkKind::Corner, [15.0, -10.0, 0.0]),
    ("G1L", LandmarkKind::Goalpost, [-15.0, 1.05, 0.8]),
    ("G2L", LandmarkKind::Goalpost, [-15.0, -1.05, 0.8]),
    ("G1R", LandmarkKind::Goalpost, [15.0, 1.05, 0.8]),
    ("G2R", LandmarkKind::Goalpost, [15.0, -1.05, 0.8]),
];

/// Landmark positions derived for one side
#[derive(Debug, Clone)]
pub struct LandmarkTable {
    entries: [Landmark; 8],
}

impl LandmarkTable {
    pub fn for_side(side: TeamSide) -> Self {
        let mut entries = LEFT_SIDE;
        if side == TeamSide::Right {
            for (_, _, pos) in &mut entries {
                pos[0] = -pos[0];
                pos[1] = -pos[1];
            }
        }
        Self { entries }
    }

    pub fn lookup(&self, tag: &[u8]) -> Option<Landmark> {
        self.entries
            .iter()
            .find(|(name, _, _)| name.as_bytes() == tag)
            .copied()
    }
}
