//! Sensor message parser
//!
//! Turns one raw server message into updates of the long-lived
//! [`SensorSnapshot`]. Parsing is a single pass over the bytes:
//!
//! ```text
//! raw bytes ──► ParseSession (cursor, depth)
//!                   │ next_tag()
//!                   ▼
//!               RootTag lookup ──► typed decoder ──► SensorSnapshot
//!                                      │ next_child(entry depth)
//!                                      ▼
//!                                  nested values
//! ```
//!
//! Unknown tags and unreadable values are logged and skipped; a malformed message
//! never aborts the parse.

pub mod landmarks;
pub mod scanner;

pub use scanner::{ParseSession, Tag, END_OF_MESSAGE};

use crate::world::geometry::sph_to_cart;
use crate::world::joints::{self, JointReading};
use crate::world::snapshot::{
    BodyPart, FieldLine, FootSensor, HeardDirection, HeardMessage, LandmarkSighting,
    PlayerSighting, SensorSnapshot, TEAM_SIZE,
};
use crate::world::{PlayModeTable, TeamSide, STEP_SECONDS};
use landmarks::LandmarkTable;

/// Top-level perceptors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootTag {
    Time,
    GameState,
    Gyro,
    Accelerometer,
    HingeJoint,
    ForceResistance,
    Vision,
    Hear,
}

const ROOT_TAGS: [(&[u8], RootTag); 8] = [
    (b"time", RootTag::Time),
    (b"GS", RootTag::GameState),
    (b"GYR", RootTag::Gyro),
    (b"ACC", RootTag::Accelerometer),
    (b"HJ", RootTag::HingeJoint),
    (b"FRP", RootTag::ForceResistance),
    (b"See", RootTag::Vision),
    (b"hear", RootTag::Hear),
];

impl RootTag {
    fn lookup(name: &[u8]) -> Option<Self> {
        ROOT_TAGS
            .iter()
            .find(|(tag, _)| *tag == name)
            .map(|(_, root)| *root)
    }
}

/// Server axis order (a, b, c) to body frame (b, -a, c)
#[inline]
fn to_body_axes(v: [f32; 3]) -> [f32; 3] {
    [v[1], -v[0], v[2]]
}

/// Everything a decoder needs besides the session and the snapshot
struct FrameContext<'a> {
    now_ms: u64,
    raw: &'a [u8],
    step: u64,
}

/// Stateful parser for one agent.
///
/// State that outlives a message (team identity, side-dependent tables) lives
/// here; per-message state lives in the [`ParseSession`].
#[derive(Debug, Clone)]
pub struct SensorParser {
    team_name: String,
    unum: u8,
    side: Option<TeamSide>,
    play_modes: PlayModeTable,
    landmarks: LandmarkTable,
}

impl SensorParser {
    pub fn new(team_name: impl Into<String>, unum: u8) -> Self {
        // tables assume the left side until the server says otherwise
        Self {
            team_name: team_name.into(),
            unum,
            side: None,
            play_modes: PlayModeTable::for_side(TeamSide::Left),
            landmarks: LandmarkTable::for_side(TeamSide::Left),
        }
    }

    pub fn side(&self) -> Option<TeamSide> {
        self.side
    }

    /// Parse one message into `snapshot`.
    ///
    /// `now_ms` is the agent's local clock, used to stamp vision and contacts.
    pub fn parse(&mut self, message: &[u8], snapshot: &mut SensorSnapshot, now_ms: u64) {
        snapshot.begin_frame();
        let ctx = FrameContext {
            now_ms,
            raw: message,
            step: snapshot.step,
        };
        let mut s = ParseSession::new(message);

        while let Some(name) = s.next_tag().name {
            if s.depth() != 1 {
                self.warn_unknown(&ctx, &s, name, "stray nested tag at root level");
                continue;
            }
            match RootTag::lookup(name) {
                Some(RootTag::Time) => self.decode_time(&mut s, snapshot, &ctx),
                Some(RootTag::GameState) => self.decode_game_state(&mut s, snapshot, &ctx),
                Some(RootTag::Gyro) => Self::decode_gyro(&mut s, snapshot, &ctx),
                Some(RootTag::Accelerometer) => Self::decode_accelerometer(&mut s, snapshot, &ctx),
                Some(RootTag::HingeJoint) => self.decode_hinge_joint(&mut s, snapshot, &ctx),
                Some(RootTag::ForceResistance) => Self::decode_force(&mut s, snapshot, &ctx),
                Some(RootTag::Vision) => self.decode_vision(&mut s, snapshot, &ctx),
                Some(RootTag::Hear) => self.decode_hear(&mut s, snapshot, &ctx),
                None => {
                    self.warn_unknown(&ctx, &s, name, "unknown root tag");
                    s.skip_element(1);
                }
            }
        }

        snapshot.final_depth = s.depth();
        if s.depth() != 0 {
            log::warn!(
                "[step {}] Unbalanced message, final depth {}: {}",
                ctx.step,
                s.depth(),
                String::from_utf8_lossy(ctx.raw)
            );
        }
    }

    fn warn_unknown(&self, ctx: &FrameContext<'_>, s: &ParseSession<'_>, tag: &[u8], what: &str) {
        log::warn!(
            "[step {}] Agent {}: {} '{}' at byte {}: {}",
            ctx.step,
            self.unum,
            what,
            String::from_utf8_lossy(tag),
            s.cursor(),
            String::from_utf8_lossy(ctx.raw)
        );
    }

    fn read_float_or_zero(&self, s: &mut ParseSession<'_>, ctx: &FrameContext<'_>, tag: &str) -> f32 {
        s.read_float().unwrap_or_else(|| {
            log::warn!(
                "[step {}] Agent {}: bad float in '{}' at byte {}: {}",
                ctx.step,
                self.unum,
                tag,
                s.cursor(),
                String::from_utf8_lossy(ctx.raw)
            );
            0.0
        })
    }

    fn read_vec3_or_zero(&self, s: &mut ParseSession<'_>, ctx: &FrameContext<'_>, tag: &str) -> [f32; 3] {
        [
            self.read_float_or_zero(s, ctx, tag),
            self.read_float_or_zero(s, ctx, tag),
            self.read_float_or_zero(s, ctx, tag),
        ]
    }

    /// Switch side and re-derive the side-dependent tables
    fn set_side(&mut self, side: TeamSide) {
        if self.side == Some(side) {
            return;
        }
        log::info!("Agent {} plays on the {:?} side", self.unum, side);
        self.side = Some(side);
        self.play_modes = PlayModeTable::for_side(side);
        self.landmarks = LandmarkTable::for_side(side);
    }

    // ========================================================================
    // Root decoders
    // ========================================================================

    fn decode_time(&self, s: &mut ParseSession<'_>, snap: &mut SensorSnapshot, ctx: &FrameContext<'_>) {
        let entry = s.depth();
        while let Some(child) = s.next_child(entry) {
            match child {
                b"now" => snap.time_server = self.read_float_or_zero(s, ctx, "now"),
                other => self.warn_unknown(ctx, s, other, "unknown time field"),
            }
        }
    }

    fn decode_game_state(
        &mut self,
        s: &mut ParseSession<'_>,
        snap: &mut SensorSnapshot,
        ctx: &FrameContext<'_>,
    ) {
        let entry = s.depth();
        let mut score_left = None;
        let mut score_right = None;
        let mut play_mode_name = None;

        while let Some(child) = s.next_child(entry) {
            match child {
                b"unum" => {
                    let unum = s.read_int();
                    if unum != Some(i64::from(self.unum)) {
                        log::debug!("Agent {} told its unum is {:?}", self.unum, unum);
                    }
                }
                b"team" => {
                    let name = s.read_string();
                    match TeamSide::from_server(&name) {
                        Some(side) => self.set_side(side),
                        None => self.warn_unknown(ctx, s, name.as_bytes(), "unknown team side"),
                    }
                }
                b"sl" => score_left = s.read_int(),
                b"sr" => score_right = s.read_int(),
                b"t" => snap.time_game = self.read_float_or_zero(s, ctx, "t"),
                b"pm" => play_mode_name = Some(s.read_string()),
                other => self.warn_unknown(ctx, s, other, "unknown game state field"),
            }
        }

        snap.team_side = self.side;
        let (ours, theirs) = match self.side {
            Some(TeamSide::Right) => (score_right, score_left),
            _ => (score_left, score_right),
        };
        if let Some(goals) = ours {
            snap.goals_scored = u32::try_from(goals).unwrap_or(0);
        }
        if let Some(goals) = theirs {
            snap.goals_conceded = u32::try_from(goals).unwrap_or(0);
        }
        if let Some(name) = play_mode_name {
            match self.play_modes.lookup(&name) {
                Some(mode) => {
                    if snap.play_mode != Some(mode) {
                        log::debug!("[step {}] Play mode {:?}", ctx.step, mode);
                    }
                    snap.play_mode = Some(mode);
                }
                None => self.warn_unknown(ctx, s, name.as_bytes(), "unknown play mode"),
            }
        }
    }

    fn decode_gyro(s: &mut ParseSession<'_>, snap: &mut SensorSnapshot, _ctx: &FrameContext<'_>) {
        let entry = s.depth();
        while let Some(child) = s.next_child(entry) {
            if child == b"rt"
                && let Some(v) = s.read_vec3()
            {
                snap.gyro = to_body_axes(v);
            }
        }
    }

    fn decode_accelerometer(s: &mut ParseSession<'_>, snap: &mut SensorSnapshot, _ctx: &FrameContext<'_>) {
        let entry = s.depth();
        while let Some(child) = s.next_child(entry) {
            if child == b"a"
                && let Some(v) = s.read_vec3()
            {
                snap.acc = to_body_axes(v);
            }
        }
    }

    fn decode_hinge_joint(
        &self,
        s: &mut ParseSession<'_>,
        snap: &mut SensorSnapshot,
        ctx: &FrameContext<'_>,
    ) {
        let entry = s.depth();
        let mut index = None;
        while let Some(child) = s.next_child(entry) {
            match child {
                b"n" => {
                    let name = s.read_token();
                    index = joints::joint_index(name);
                    if index.is_none() {
                        self.warn_unknown(ctx, s, name, "unknown joint");
                    }
                }
                b"ax" => {
                    let mut angle = self.read_float_or_zero(s, ctx, "ax");
                    let Some(i) = index else { continue };
                    if joints::is_mirrored(i) {
                        angle = -angle;
                    }
                    let previous = snap.joints[i].position_deg;
                    snap.joints[i] = JointReading {
                        position_deg: angle,
                        speed_rad_s: ((angle - previous) / STEP_SECONDS).to_radians(),
                    };
                }
                other => self.warn_unknown(ctx, s, other, "unknown joint field"),
            }
        }
    }

    fn decode_force(s: &mut ParseSession<'_>, snap: &mut SensorSnapshot, ctx: &FrameContext<'_>) {
        let entry = s.depth();
        let mut sensor = None;
        let mut point = None;
        let mut force = None;
        while let Some(child) = s.next_child(entry) {
            match child {
                b"n" => sensor = FootSensor::from_name(s.read_token()),
                b"c" => point = s.read_vec3(),
                b"f" => force = s.read_vec3(),
                _ => {}
            }
        }
        if let (Some(sensor), Some(point), Some(force)) = (sensor, point, force) {
            let contact = &mut snap.feet[sensor.index()];
            contact.touching = true;
            contact.point = to_body_axes(point);
            contact.force = to_body_axes(force);
            contact.last_touch_ms = Some(ctx.now_ms);
        }
    }

    fn decode_vision(
        &self,
        s: &mut ParseSession<'_>,
        snap: &mut SensorSnapshot,
        ctx: &FrameContext<'_>,
    ) {
        snap.begin_vision(ctx.now_ms);
        let entry = s.depth();

        while let Some(child) = s.next_child(entry) {
            match child {
                b"B" => {
                    if let Some(pol) = self.read_polar_child(s, ctx) {
                        snap.ball_is_visible = true;
                        snap.ball_rel_sph = pol;
                        snap.ball_rel_cart = sph_to_cart(pol);
                        snap.ball_last_seen_ms = Some(ctx.now_ms);
                    }
                }
                b"P" => self.decode_player(s, snap, ctx),
                b"L" => self.decode_line(s, snap, ctx),
                b"mypos" => {
                    snap.cheat_abs_pos = Some(self.read_vec3_or_zero(s, ctx, "mypos"));
                    snap.cheat_pose_in_frame = true;
                }
                b"myorien" => snap.cheat_ori_deg = Some(self.read_float_or_zero(s, ctx, "myorien")),
                b"ballpos" => snap.cheat_ball_abs_pos = Some(self.read_vec3_or_zero(s, ctx, "ballpos")),
                other => match self.landmarks.lookup(other) {
                    Some((name, kind, abs_pos)) => {
                        if let Some(rel_sph) = self.read_polar_child(s, ctx) {
                            snap.landmarks.push(LandmarkSighting {
                                name,
                                kind,
                                abs_pos,
                                rel_sph,
                            });
                        }
                    }
                    None => self.warn_unknown(ctx, s, other, "unknown vision object"),
                },
            }
        }
    }

    /// Read the `(pol d h v)` child of the current element
    fn read_polar_child(&self, s: &mut ParseSession<'_>, ctx: &FrameContext<'_>) -> Option<[f32; 3]> {
        let entry = s.depth();
        let mut pol = None;
        while let Some(child) = s.next_child(entry) {
            if child == b"pol" {
                pol = Some(self.read_vec3_or_zero(s, ctx, "pol"));
            }
        }
        pol
    }

    fn decode_player(&self, s: &mut ParseSession<'_>, snap: &mut SensorSnapshot, ctx: &FrameContext<'_>) {
        let entry = s.depth();
        let mut teammate = None;
        let mut unum = None;
        let mut sighting = PlayerSighting {
            is_visible: true,
            ..PlayerSighting::default()
        };

        while let Some(child) = s.next_child(entry) {
            match child {
                b"team" => {
                    let team = s.read_string();
                    let ours = team == self.team_name.as_str();
                    if !ours && snap.opponent_team_name.as_deref() != Some(&*team) {
                        snap.opponent_team_name = Some(team.into_owned());
                    }
                    teammate = Some(ours);
                }
                b"id" => unum = s.read_int(),
                part => match BodyPart::from_tag(part) {
                    Some(part) => sighting.body_parts[part.index()] = self.read_polar_child(s, ctx),
                    None => self.warn_unknown(ctx, s, part, "unknown body part"),
                },
            }
        }

        let (Some(teammate), Some(unum)) = (teammate, unum) else {
            log::debug!("[step {}] Player sighting without team or id", ctx.step);
            return;
        };
        let slot = usize::try_from(unum)
            .ok()
            .and_then(|u| u.checked_sub(1))
            .filter(|&i| i < TEAM_SIZE);
        let Some(i) = slot else {
            log::warn!("[step {}] Player sighting with invalid id {}", ctx.step, unum);
            return;
        };
        if teammate {
            snap.teammates[i] = sighting;
        } else {
            snap.opponents[i] = sighting;
        }
    }

    fn decode_line(&self, s: &mut ParseSession<'_>, snap: &mut SensorSnapshot, ctx: &FrameContext<'_>) {
        let entry = s.depth();
        let mut ends = Vec::with_capacity(2);
        while let Some(child) = s.next_child(entry) {
            if child == b"pol" {
                ends.push(self.read_vec3_or_zero(s, ctx, "pol"));
            }
        }
        let &[start, end] = ends.as_slice() else {
            log::warn!("[step {}] Field line with {} end points", ctx.step, ends.len());
            return;
        };
        if start.iter().chain(end.iter()).any(|v| v.is_nan()) {
            log::warn!(
                "[step {}] Dropping field line with NaN: {}",
                ctx.step,
                String::from_utf8_lossy(ctx.raw)
            );
            return;
        }
        snap.lines.push(FieldLine {
            start: sph_to_cart(start),
            end: sph_to_cart(end),
        });
    }

    /// `(hear TEAM TIME self|DIRECTION MESSAGE)`
    fn decode_hear(&self, s: &mut ParseSession<'_>, snap: &mut SensorSnapshot, ctx: &FrameContext<'_>) {
        let team = s.read_token();
        if team != self.team_name.as_bytes() {
            return;
        }
        let time = self.read_float_or_zero(s, ctx, "hear");
        let direction = match s.read_token() {
            b"self" => HeardDirection::Itself,
            token => match std::str::from_utf8(token).ok().and_then(|t| t.parse().ok()) {
                Some(bearing) => HeardDirection::Bearing(bearing),
                None => {
                    self.warn_unknown(ctx, s, token, "bad hear direction");
                    return;
                }
            },
        };
        let payload = s.read_token().to_vec();
        snap.heard.push(HeardMessage {
            time,
            direction,
            payload,
        });
    }
}
