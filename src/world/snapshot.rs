//! Raw perceptor values from the latest sensor message
//!
//! The parser writes into one long-lived [`SensorSnapshot`]. Persistent fields
//! keep their value until a message changes them; transient fields (heard
//! messages, visibility flags) are reset at the start of every message by
//! [`SensorSnapshot::begin_frame`].

use super::joints::{JOINT_COUNT, JointReading};
use super::play_mode::PlayMode;
use super::TeamSide;

/// Players per team
pub const TEAM_SIZE: usize = 11;

// ============================================================================
// Perceptor value types
// ============================================================================

/// Foot pressure sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FootSensor {
    LeftFoot,
    RightFoot,
    LeftToe,
    RightToe,
}

impl FootSensor {
    pub const ALL: [FootSensor; 4] = [
        FootSensor::LeftFoot,
        FootSensor::RightFoot,
        FootSensor::LeftToe,
        FootSensor::RightToe,
    ];

    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"lf" => Some(FootSensor::LeftFoot),
            b"rf" => Some(FootSensor::RightFoot),
            b"lf1" => Some(FootSensor::LeftToe),
            b"rf1" => Some(FootSensor::RightToe),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Foot resistance perceptor state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FootContact {
    pub touching: bool,
    /// Contact point relative to the foot (m)
    pub point: [f32; 3],
    /// Force vector (N)
    pub force: [f32; 3],
    pub last_touch_ms: Option<u64>,
}

/// Body part reported in a player sighting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPart {
    Head,
    LeftLowerArm,
    RightLowerArm,
    LeftFoot,
    RightFoot,
}

impl BodyPart {
    pub const COUNT: usize = 5;

    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"head" => Some(BodyPart::Head),
            b"llowerarm" => Some(BodyPart::LeftLowerArm),
            b"rlowerarm" => Some(BodyPart::RightLowerArm),
            b"lfoot" => Some(BodyPart::LeftFoot),
            b"rfoot" => Some(BodyPart::RightFoot),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Latest sighting of another player, relative to our head
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerSighting {
    pub is_visible: bool,
    /// Spherical (distance, horizontal°, vertical°) per body part
    pub body_parts: [Option<[f32; 3]>; BodyPart::COUNT],
}

impl PlayerSighting {
    pub fn part(&self, part: BodyPart) -> Option<[f32; 3]> {
        self.body_parts[part.index()]
    }
}

/// Landmark category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkKind {
    Corner,
    Goalpost,
}

/// A visible landmark with its known absolute position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkSighting {
    pub name: &'static str,
    pub kind: LandmarkKind,
    pub abs_pos: [f32; 3],
    /// Spherical (distance, horizontal°, vertical°)
    pub rel_sph: [f32; 3],
}

/// A field line segment, cartesian relative to the head
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldLine {
    pub start: [f32; 3],
    pub end: [f32; 3],
}

/// Where a heard message came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeardDirection {
    /// Our own announcement echoed back
    Itself,
    /// Horizontal bearing in degrees
    Bearing(f32),
}

/// A message heard from a teammate
#[derive(Debug, Clone, PartialEq)]
pub struct HeardMessage {
    pub time: f32,
    pub direction: HeardDirection,
    pub payload: Vec<u8>,
}

impl HeardMessage {
    pub fn is_own(&self) -> bool {
        self.direction == HeardDirection::Itself
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Everything the last sensor message told us
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSnapshot {
    /// Sensor messages parsed so far
    pub step: u64,

    // game state
    pub time_server: f32,
    pub time_game: f32,
    pub goals_scored: u32,
    pub goals_conceded: u32,
    pub play_mode: Option<PlayMode>,
    pub team_side: Option<TeamSide>,
    pub opponent_team_name: Option<String>,

    // proprioception
    pub gyro: [f32; 3],
    pub acc: [f32; 3],
    pub joints: [JointReading; JOINT_COUNT],
    pub feet: [FootContact; 4],

    // vision
    pub vision_is_up_to_date: bool,
    pub vision_last_update_ms: Option<u64>,
    pub landmarks: Vec<LandmarkSighting>,
    pub lines: Vec<FieldLine>,
    pub ball_is_visible: bool,
    pub ball_rel_sph: [f32; 3],
    pub ball_rel_cart: [f32; 3],
    pub ball_last_seen_ms: Option<u64>,
    pub teammates: [PlayerSighting; TEAM_SIZE],
    pub opponents: [PlayerSighting; TEAM_SIZE],

    // ground truth, when the server runs with cheats enabled
    pub cheat_abs_pos: Option<[f32; 3]>,
    pub cheat_ori_deg: Option<f32>,
    pub cheat_ball_abs_pos: Option<[f32; 3]>,
    pub cheat_pose_in_frame: bool,

    pub heard: Vec<HeardMessage>,

    /// Nesting depth left over after the last parse (0 when balanced)
    pub final_depth: i32,
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self {
            step: 0,
            time_server: 0.0,
            time_game: 0.0,
            goals_scored: 0,
            goals_conceded: 0,
            play_mode: None,
            team_side: None,
            opponent_team_name: None,
            gyro: [0.0; 3],
            acc: [0.0; 3],
            joints: [JointReading::default(); JOINT_COUNT],
            feet: [FootContact::default(); 4],
            vision_is_up_to_date: false,
            vision_last_update_ms: None,
            landmarks: Vec::new(),
            lines: Vec::new(),
            ball_is_visible: false,
            ball_rel_sph: [0.0; 3],
            ball_rel_cart: [0.0; 3],
            ball_last_seen_ms: None,
            teammates: [PlayerSighting::default(); TEAM_SIZE],
            opponents: [PlayerSighting::default(); TEAM_SIZE],
            cheat_abs_pos: None,
            cheat_ori_deg: None,
            cheat_ball_abs_pos: None,
            cheat_pose_in_frame: false,
            heard: Vec::new(),
            final_depth: 0,
        }
    }
}

impl SensorSnapshot {
    /// Reset transient fields before a new sensor message is applied
    pub fn begin_frame(&mut self) {
        self.step += 1;
        self.heard.clear();
        self.vision_is_up_to_date = false;
        self.cheat_pose_in_frame = false;
        self.ball_is_visible = false;
        self.landmarks.clear();
        self.lines.clear();
        for p in self.teammates.iter_mut().chain(self.opponents.iter_mut()) {
            p.is_visible = false;
        }
        for foot in &mut self.feet {
            foot.touching = false;
            foot.point = [0.0; 3];
            foot.force = [0.0; 3];
        }
    }

    /// Mark the vision block of the current message
    pub fn begin_vision(&mut self, now_ms: u64) {
        self.vision_is_up_to_date = true;
        self.vision_last_update_ms = Some(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_frame_resets_transient_fields() {
        let mut snap = SensorSnapshot::default();
        snap.heard.push(HeardMessage {
            time: 1.0,
            direction: HeardDirection::Itself,
            payload: b"abc".to_vec(),
        });
        snap.vision_is_up_to_date = true;
        snap.feet[0].touching = true;
        snap.goals_scored = 2;

        snap.begin_frame();

        assert!(snap.heard.is_empty());
        assert!(!snap.vision_is_up_to_date);
        assert!(!snap.feet[0].touching);
        assert_eq!(snap.goals_scored, 2);
        assert_eq!(snap.step, 1);
    }

    #[test]
    fn test_stale_visibility_never_leaks() {
        let mut snap = SensorSnapshot::default();
        snap.teammates[3].is_visible = true;
        snap.opponents[10].is_visible = true;
        snap.ball_is_visible = true;
        snap.lines.push(FieldLine {
            start: [0.0; 3],
            end: [1.0; 3],
        });

        snap.begin_frame();

        assert!(!snap.teammates[3].is_visible);
        assert!(!snap.opponents[10].is_visible);
        assert!(!snap.ball_is_visible);
        assert!(snap.lines.is_empty());

        snap.begin_vision(60);
        assert!(snap.vision_is_up_to_date);
        assert_eq!(snap.vision_last_update_ms, Some(60));
    }
}
