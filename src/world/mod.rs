//! Agent world model
//!
//! Holds the raw [`SensorSnapshot`] written by the parser plus the derived,
//! time-stamped state of every player and the ball.
//!
//! # Step order
//!
//! ```text
//! parse frame  ──► snapshot (stamped with time_local_ms = T)
//! hear radio   ──► entity states (stamped T - 20)
//! update()     ──► vision integration (stamped T)
//!                  velocity decay for entities vision did not refresh
//!                  self entity mirrors self-localization
//!                  time_local_ms = T + 20
//! ```

pub mod entity;
pub mod geometry;
pub mod joints;
pub mod play_mode;
pub mod snapshot;

pub use entity::{
    BallState, EntityRef, EntityState, SelfLocalization, TrustSource, FALLEN_HEAD_HEIGHT,
};
pub use play_mode::{PlayMode, PlayModeGroup, PlayModeTable};
pub use snapshot::{BodyPart, HeardDirection, HeardMessage, SensorSnapshot, TEAM_SIZE};

use geometry::{add, rotate_z, sph_to_cart};

/// Simulation step (ms)
pub const STEP_MS: u64 = 20;

/// Simulation step (s)
pub const STEP_SECONDS: f32 = 0.02;

/// Field side our team defends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeamSide {
    Left,
    Right,
}

impl TeamSide {
    /// Parse the side as sent in the game-state perceptor (`left`/`right`)
    pub fn from_server(name: &str) -> Option<Self> {
        match name {
            "left" => Some(TeamSide::Left),
            "right" => Some(TeamSide::Right),
            _ => None,
        }
    }

    /// Name used by monitor commands
    pub fn monitor_name(self) -> &'static str {
        match self {
            TeamSide::Left => "Left",
            TeamSide::Right => "Right",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            TeamSide::Left => TeamSide::Right,
            TeamSide::Right => TeamSide::Left,
        }
    }
}

/// Complete agent belief state
#[derive(Debug, Clone)]
pub struct WorldModel {
    pub team_name: String,
    pub unum: u8,
    /// Local clock (ms), advanced once per processed sensor message
    pub time_local_ms: u64,
    pub snapshot: SensorSnapshot,
    /// Index `unum - 1`; our own slot mirrors self-localization
    pub teammates: Vec<EntityState>,
    pub opponents: Vec<EntityState>,
    pub ball: BallState,
    pub self_loc: SelfLocalization,
}

impl WorldModel {
    pub fn new(team_name: impl Into<String>, unum: u8) -> Self {
        let teammates = (1..=TEAM_SIZE as u8)
            .map(|u| EntityState::new(u, true, u == unum))
            .collect();
        let opponents = (1..=TEAM_SIZE as u8)
            .map(|u| EntityState::new(u, false, false))
            .collect();
        Self {
            team_name: team_name.into(),
            unum,
            time_local_ms: 0,
            snapshot: SensorSnapshot::default(),
            teammates,
            opponents,
            ball: BallState::default(),
            self_loc: SelfLocalization::default(),
        }
    }

    pub fn team_side(&self) -> Option<TeamSide> {
        self.snapshot.team_side
    }

    pub fn play_mode_group(&self) -> Option<PlayModeGroup> {
        self.snapshot.play_mode.map(PlayMode::group)
    }

    /// Player slot, `None` for an out-of-range unum
    pub fn entity(&self, r: EntityRef) -> Option<&EntityState> {
        let idx = usize::from(r.unum()).checked_sub(1)?;
        match r {
            EntityRef::Teammate(_) => self.teammates.get(idx),
            EntityRef::Opponent(_) => self.opponents.get(idx),
        }
    }

    pub fn entity_mut(&mut self, r: EntityRef) -> Option<&mut EntityState> {
        let idx = usize::from(r.unum()).checked_sub(1)?;
        match r {
            EntityRef::Teammate(_) => self.teammates.get_mut(idx),
            EntityRef::Opponent(_) => self.opponents.get_mut(idx),
        }
    }

    pub fn is_self(&self, r: EntityRef) -> bool {
        r == EntityRef::Teammate(self.unum)
    }

    /// Store the localizer's head pose for the current step
    pub fn set_self_localization(&mut self, head_position: [f32; 3], yaw_deg: f32) {
        self.self_loc.head_position = Some(head_position);
        self.self_loc.yaw_deg = yaw_deg;
        self.self_loc.last_update_ms = Some(self.time_local_ms);
    }

    /// End-of-step bookkeeping; see the module docs for the order.
    pub fn update(&mut self) {
        let now = self.time_local_ms;

        if self.snapshot.cheat_pose_in_frame
            && let (Some(pos), Some(ori)) = (self.snapshot.cheat_abs_pos, self.snapshot.cheat_ori_deg)
        {
            // ground truth is the torso; head yaw adds the neck pan
            let pan = self.snapshot.joints[0].position_deg;
            self.set_self_localization(pos, ori + pan);
        }

        let vision_stamp = self
            .snapshot
            .vision_last_update_ms
            .filter(|_| self.snapshot.vision_is_up_to_date);
        if let Some(stamp) = vision_stamp {
            self.integrate_vision(stamp);
        }

        for e in self.teammates.iter_mut().chain(self.opponents.iter_mut()) {
            let refreshed_by_vision =
                e.source == Some(TrustSource::Vision) && e.last_update_ms == vision_stamp;
            if !refreshed_by_vision {
                e.decay_velocity();
            }
        }

        self.mirror_self();
        self.time_local_ms = now + STEP_MS;
    }

    /// Turn relative sightings into absolute entity states.
    ///
    /// Assumes a level head: only the yaw rotates observations into the field frame.
    fn integrate_vision(&mut self, stamp: u64) {
        let (Some(head), true) = (self.self_loc.head_position, self.self_loc.is_fresh(stamp, 0))
        else {
            return;
        };
        let yaw = self.self_loc.yaw_deg;
        let to_abs = |sph: [f32; 3]| add(head, rotate_z(sph_to_cart(sph), yaw));

        if self.snapshot.ball_is_visible {
            let pos = to_abs(self.snapshot.ball_rel_sph);
            self.ball.observe(pos, stamp, TrustSource::Vision);
        }

        let own_unum = self.unum;
        let groups = [
            (&self.snapshot.teammates, &mut self.teammates, true),
            (&self.snapshot.opponents, &mut self.opponents, false),
        ];
        for (sightings, states, teammates) in groups {
            for (sighting, state) in sightings.iter().zip(states.iter_mut()) {
                if !sighting.is_visible || (teammates && state.unum == own_unum) {
                    continue;
                }
                if let Some(sph) = sighting.part(BodyPart::Head) {
                    let abs = to_abs(sph);
                    state.observe(
                        [abs[0], abs[1]],
                        Some(abs[2]),
                        abs[2] < FALLEN_HEAD_HEIGHT,
                        stamp,
                        TrustSource::Vision,
                    );
                } else {
                    let parts: Vec<[f32; 3]> =
                        sighting.body_parts.iter().flatten().map(|&p| to_abs(p)).collect();
                    if parts.is_empty() {
                        continue;
                    }
                    let n = parts.len() as f32;
                    let x = parts.iter().map(|p| p[0]).sum::<f32>() / n;
                    let y = parts.iter().map(|p| p[1]).sum::<f32>() / n;
                    let fallen = state.fallen;
                    state.observe([x, y], None, fallen, stamp, TrustSource::Vision);
                }
            }
        }
    }

    /// Copy self-localization into our own teammate slot
    fn mirror_self(&mut self) {
        let Some(idx) = usize::from(self.unum).checked_sub(1) else {
            return;
        };
        let (Some(head), Some(last)) = (self.self_loc.head_position, self.self_loc.last_update_ms)
        else {
            return;
        };
        let Some(me) = self.teammates.get_mut(idx) else {
            return;
        };
        if me.last_update_ms.is_some_and(|prev| prev >= last) {
            return;
        }
        me.abs_pos = Some([head[0], head[1]]);
        me.head_height = Some(head[2]);
        me.fallen = head[2] < FALLEN_HEAD_HEIGHT;
        me.last_update_ms = Some(last);
        me.source = Some(TrustSource::SelfLocalization);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn localized_world() -> WorldModel {
        let mut world = WorldModel::new("KhelFC", 5);
        world.time_local_ms = 1000;
        world.set_self_localization([0.0, 0.0, 0.5], 90.0);
        world
    }

    #[test]
    fn test_team_side_names() {
        assert_eq!(TeamSide::from_server("left"), Some(TeamSide::Left));
        assert_eq!(TeamSide::from_server("Left"), None);
        assert_eq!(TeamSide::Right.monitor_name(), "Right");
        assert_eq!(TeamSide::Left.opposite(), TeamSide::Right);
    }

    #[test]
    fn test_entity_lookup_bounds() {
        let world = WorldModel::new("KhelFC", 5);
        assert!(world.entity(EntityRef::Teammate(0)).is_none());
        assert!(world.entity(EntityRef::Opponent(12)).is_none());
        assert!(world.entity(EntityRef::Teammate(5)).unwrap().is_self);
        assert!(world.is_self(EntityRef::Teammate(5)));
        assert!(!world.is_self(EntityRef::Opponent(5)));
    }

    #[test]
    fn test_update_advances_clock_and_mirrors_self() {
        let mut world = localized_world();
        world.update();
        assert_eq!(world.time_local_ms, 1020);

        let me = world.entity(EntityRef::Teammate(5)).unwrap();
        assert_eq!(me.abs_pos, Some([0.0, 0.0]));
        assert_eq!(me.head_height, Some(0.5));
        assert_eq!(me.last_update_ms, Some(1000));
        assert_eq!(me.source, Some(TrustSource::SelfLocalization));
    }

    #[test]
    fn test_vision_integration_rotates_by_yaw() {
        let mut world = localized_world();
        world.snapshot.begin_vision(1000);
        world.snapshot.ball_is_visible = true;
        world.snapshot.ball_rel_sph = [2.0, 0.0, 0.0];
        world.snapshot.opponents[2].is_visible = true;
        world.snapshot.opponents[2].body_parts[BodyPart::Head.index()] = Some([1.0, 0.0, 0.0]);

        world.update();

        // facing +y, so "straight ahead" is +y
        let ball = world.ball.abs_pos.unwrap();
        assert_relative_eq!(ball[0], 0.0, epsilon = 1e-5);
        assert_relative_eq!(ball[1], 2.0, epsilon = 1e-5);

        let opp = world.entity(EntityRef::Opponent(3)).unwrap();
        let pos = opp.abs_pos.unwrap();
        assert_relative_eq!(pos[1], 1.0, epsilon = 1e-5);
        assert_relative_eq!(opp.head_height.unwrap(), 0.5, epsilon = 1e-5);
        assert!(opp.is_fresh(1000, 0));
        assert_eq!(opp.source, Some(TrustSource::Vision));
    }

    #[test]
    fn test_unrefreshed_velocity_decays() {
        let mut world = localized_world();
        world.opponents[0].filtered_velocity = [1.0, -1.0];
        world.update();
        assert_relative_eq!(world.opponents[0].filtered_velocity[0], 0.95);
        assert_relative_eq!(world.opponents[0].filtered_velocity[1], -0.95);
    }

    #[test]
    fn test_cheat_pose_feeds_self_localization() {
        let mut world = WorldModel::new("KhelFC", 2);
        world.snapshot.cheat_abs_pos = Some([3.0, -1.0, 0.55]);
        world.snapshot.cheat_ori_deg = Some(45.0);
        world.snapshot.cheat_pose_in_frame = true;
        world.snapshot.joints[0].position_deg = 10.0;
        world.update();
        assert_eq!(world.self_loc.head_position, Some([3.0, -1.0, 0.55]));
        assert_relative_eq!(world.self_loc.yaw_deg, 55.0);
        assert_eq!(world.self_loc.last_update_ms, Some(0));
    }
}
