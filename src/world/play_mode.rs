//! Team-relative play modes
//!
//! The server names set-piece modes by field side (`KickOff_Left`,
//! `corner_kick_right`, ...). The agent reasons in team-relative terms, so the
//! name→mode table depends on which side we play and is rebuilt whenever the
//! server announces a side.

use super::TeamSide;

/// Play mode seen from our team's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayMode {
    OurKickOff,
    OurKickIn,
    OurCornerKick,
    OurGoalKick,
    OurFreeKick,
    OurPass,
    OurDirectFreeKick,
    OurGoal,
    OurOffside,
    TheirKickOff,
    TheirKickIn,
    TheirCornerKick,
    TheirGoalKick,
    TheirFreeKick,
    TheirPass,
    TheirDirectFreeKick,
    TheirGoal,
    TheirOffside,
    BeforeKickOff,
    GameOver,
    PlayOn,
}

/// Coarse grouping used by behaviors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayModeGroup {
    /// We restart play
    OurKick,
    /// They restart play
    TheirKick,
    /// Players must beam before we kick off
    ActiveBeam,
    /// Players must beam before they kick off
    PassiveBeam,
    /// Play on, game over
    Other,
}

impl PlayMode {
    pub fn group(self) -> PlayModeGroup {
        use PlayMode::*;
        match self {
            OurKickOff | OurKickIn | OurCornerKick | OurGoalKick | OurFreeKick | OurPass
            | OurDirectFreeKick | TheirOffside => PlayModeGroup::OurKick,
            TheirKickOff | TheirKickIn | TheirCornerKick | TheirGoalKick | TheirFreeKick
            | TheirPass | TheirDirectFreeKick | OurOffside => PlayModeGroup::TheirKick,
            BeforeKickOff | TheirGoal => PlayModeGroup::ActiveBeam,
            OurGoal => PlayModeGroup::PassiveBeam,
            GameOver | PlayOn => PlayModeGroup::Other,
        }
    }
}

/// Server names of side-dependent modes, as (left-side name, right-side name, mode
/// when we play left)
const SIDED_MODES: [(&str, &str, PlayMode); 9] = [
    ("KickOff_Left", "KickOff_Right", PlayMode::OurKickOff),
    ("KickIn_Left", "KickIn_Right", PlayMode::OurKickIn),
    ("corner_kick_left", "corner_kick_right", PlayMode::OurCornerKick),
    ("goal_kick_left", "goal_kick_right", PlayMode::OurGoalKick),
    ("free_kick_left", "free_kick_right", PlayMode::OurFreeKick),
    ("pass_left", "pass_right", PlayMode::OurPass),
    ("direct_free_kick_left", "direct_free_kick_right", PlayMode::OurDirectFreeKick),
    ("Goal_Left", "Goal_Right", PlayMode::OurGoal),
    ("offside_left", "offside_right", PlayMode::OurOffside),
];

fn theirs(mode: PlayMode) -> PlayMode {
    use PlayMode::*;
    match mode {
        OurKickOff => TheirKickOff,
        OurKickIn => TheirKickIn,
        OurCornerKick => TheirCornerKick,
        OurGoalKick => TheirGoalKick,
        OurFreeKick => TheirFreeKick,
        OurPass => TheirPass,
        OurDirectFreeKick => TheirDirectFreeKick,
        OurGoal => TheirGoal,
        OurOffside => TheirOffside,
        other => other,
    }
}

/// Server name → team-relative mode, derived for one side
#[derive(Debug, Clone)]
pub struct PlayModeTable {
    side: TeamSide,
    entries: Vec<(&'static str, PlayMode)>,
}

impl PlayModeTable {
    pub fn for_side(side: TeamSide) -> Self {
        let mut entries = Vec::with_capacity(SIDED_MODES.len() * 2 + 3);
        for (left_name, right_name, ours) in SIDED_MODES {
            let (own_name, other_name) = match side {
                TeamSide::Left => (left_name, right_name),
                TeamSide::Right => (right_name, left_name),
            };
            entries.push((own_name, ours));
            entries.push((other_name, theirs(ours)));
        }
        entries.push(("BeforeKickOff", PlayMode::BeforeKickOff));
        entries.push(("GameOver", PlayMode::GameOver));
        entries.push(("PlayOn", PlayMode::PlayOn));
        Self { side, entries }
    }

    pub fn side(&self) -> TeamSide {
        self.side
    }

    pub fn lookup(&self, server_name: &str) -> Option<PlayMode> {
        self.entries
            .iter()
            .find(|(name, _)| *name == server_name)
            .map(|(_, mode)| *mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_side_mapping() {
        let table = PlayModeTable::for_side(TeamSide::Left);
        assert_eq!(table.lookup("KickOff_Left"), Some(PlayMode::OurKickOff));
        assert_eq!(table.lookup("corner_kick_right"), Some(PlayMode::TheirCornerKick));
        assert_eq!(table.lookup("PlayOn"), Some(PlayMode::PlayOn));
        assert_eq!(table.lookup("Penalty_Left"), None);
    }

    #[test]
    fn test_right_side_mapping_is_mirrored() {
        let table = PlayModeTable::for_side(TeamSide::Right);
        assert_eq!(table.lookup("KickOff_Left"), Some(PlayMode::TheirKickOff));
        assert_eq!(table.lookup("KickOff_Right"), Some(PlayMode::OurKickOff));
        assert_eq!(table.lookup("Goal_Left"), Some(PlayMode::TheirGoal));
        assert_eq!(table.lookup("BeforeKickOff"), Some(PlayMode::BeforeKickOff));
    }

    #[test]
    fn test_groups() {
        assert_eq!(PlayMode::TheirOffside.group(), PlayModeGroup::OurKick);
        assert_eq!(PlayMode::OurOffside.group(), PlayModeGroup::TheirKick);
        assert_eq!(PlayMode::TheirGoal.group(), PlayModeGroup::ActiveBeam);
        assert_eq!(PlayMode::OurGoal.group(), PlayModeGroup::PassiveBeam);
        assert_eq!(PlayMode::PlayOn.group(), PlayModeGroup::Other);
    }
}
