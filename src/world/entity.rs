//! Tracked state of other players, the ball and ourselves
//!
//! Every piece of state carries the local time (ms) of its last update. A
//! timestamp of `None` means "never observed", which is distinct from "observed
//! long ago".

use super::geometry::norm2;

/// Per-step velocity decay applied to entities not refreshed by vision
pub const VELOCITY_DECAY: f32 = 0.95;

/// Weight of a new velocity sample in the low-pass filter
pub const VELOCITY_FILTER_GAIN: f32 = 0.3;

/// A velocity jump at or above this (m/s) is a teleport, not motion
pub const BEAM_SPEED_THRESHOLD: f32 = 4.0;

/// Head below this height (m) counts as fallen
pub const FALLEN_HEAD_HEIGHT: f32 = 0.3;

/// Where an entity's latest state came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustSource {
    Vision,
    Radio,
    SelfLocalization,
}

/// Reference to a player slot by team and uniform number (1..=11)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Teammate(u8),
    Opponent(u8),
}

impl EntityRef {
    pub fn unum(self) -> u8 {
        match self {
            EntityRef::Teammate(u) | EntityRef::Opponent(u) => u,
        }
    }
}

/// Tracked state of one other player
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub unum: u8,
    pub is_teammate: bool,
    pub is_self: bool,
    /// Absolute 2D position (m)
    pub abs_pos: Option<[f32; 2]>,
    /// Head height (m); `None` when the position came without a height
    pub head_height: Option<f32>,
    pub fallen: bool,
    /// Low-pass filtered planar velocity (m/s)
    pub filtered_velocity: [f32; 2],
    pub last_update_ms: Option<u64>,
    pub source: Option<TrustSource>,
}

impl EntityState {
    pub fn new(unum: u8, is_teammate: bool, is_self: bool) -> Self {
        Self {
            unum,
            is_teammate,
            is_self,
            abs_pos: None,
            head_height: None,
            fallen: false,
            filtered_velocity: [0.0; 2],
            last_update_ms: None,
            source: None,
        }
    }

    /// Updated within `window_ms` of `now_ms`
    pub fn is_fresh(&self, now_ms: u64, window_ms: u64) -> bool {
        self.last_update_ms
            .is_some_and(|last| last.saturating_add(window_ms) >= now_ms)
    }

    /// Position includes a head height, so it can be reported over the radio
    pub fn has_full_position(&self) -> bool {
        self.abs_pos.is_some() && self.head_height.is_some()
    }

    /// Record a new observation and refresh the filtered velocity.
    ///
    /// Observations older than the current state are ignored so timestamps never
    /// go backwards. Radio observations arrive before the end-of-step decay is
    /// applied, so the decay is undone first to keep the filter neutral.
    pub fn observe(
        &mut self,
        pos: [f32; 2],
        head_height: Option<f32>,
        fallen: bool,
        time_ms: u64,
        source: TrustSource,
    ) {
        if let Some(last) = self.last_update_ms
            && time_ms < last
        {
            log::debug!(
                "Ignoring out-of-order update for player {} ({} < {})",
                self.unum,
                time_ms,
                last
            );
            return;
        }

        if let (Some(old), Some(last)) = (self.abs_pos, self.last_update_ms)
            && time_ms > last
        {
            let dt = (time_ms - last) as f32 / 1000.0;
            let sample = [(pos[0] - old[0]) / dt, (pos[1] - old[1]) / dt];
            let diff = [
                sample[0] - self.filtered_velocity[0],
                sample[1] - self.filtered_velocity[1],
            ];

            if norm2(diff) < BEAM_SPEED_THRESHOLD {
                if source == TrustSource::Radio {
                    self.filtered_velocity[0] /= VELOCITY_DECAY;
                    self.filtered_velocity[1] /= VELOCITY_DECAY;
                }
                self.filtered_velocity[0] += VELOCITY_FILTER_GAIN * diff[0];
                self.filtered_velocity[1] += VELOCITY_FILTER_GAIN * diff[1];
            } else {
                // teleported (beam or referee move)
                self.filtered_velocity = [0.0; 2];
            }
        }

        self.abs_pos = Some(pos);
        self.head_height = head_height;
        self.fallen = fallen;
        self.last_update_ms = Some(time_ms);
        self.source = Some(source);
    }

    pub fn decay_velocity(&mut self) {
        self.filtered_velocity[0] *= VELOCITY_DECAY;
        self.filtered_velocity[1] *= VELOCITY_DECAY;
    }
}

/// Ball estimate in absolute coordinates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BallState {
    pub abs_pos: Option<[f32; 3]>,
    pub abs_vel: [f32; 3],
    pub last_update_ms: Option<u64>,
    pub source: Option<TrustSource>,
}

impl BallState {
    pub fn is_fresh(&self, now_ms: u64, window_ms: u64) -> bool {
        self.last_update_ms
            .is_some_and(|last| last.saturating_add(window_ms) >= now_ms)
    }

    /// Set a new position; velocity is the finite difference to the previous one.
    pub fn observe(&mut self, pos: [f32; 3], time_ms: u64, source: TrustSource) {
        if let Some(last) = self.last_update_ms
            && time_ms <= last
        {
            return;
        }

        self.abs_vel = match (self.abs_pos, self.last_update_ms) {
            (Some(old), Some(last)) => {
                let dt = (time_ms - last) as f32 / 1000.0;
                [
                    (pos[0] - old[0]) / dt,
                    (pos[1] - old[1]) / dt,
                    (pos[2] - old[2]) / dt,
                ]
            }
            _ => [0.0; 3],
        };
        self.abs_pos = Some(pos);
        self.last_update_ms = Some(time_ms);
        self.source = Some(source);
    }
}

/// Own pose as produced by the localizer (or by teammates over the radio)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelfLocalization {
    /// Absolute head position (m)
    pub head_position: Option<[f32; 3]>,
    /// Head yaw in the field frame (degrees)
    pub yaw_deg: f32,
    pub last_update_ms: Option<u64>,
    /// Fallen flag as reported by a teammate
    pub radio_fallen: bool,
    pub radio_last_update_ms: Option<u64>,
}

impl SelfLocalization {
    pub fn is_fresh(&self, now_ms: u64, window_ms: u64) -> bool {
        self.last_update_ms
            .is_some_and(|last| last.saturating_add(window_ms) >= now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_freshness_window() {
        let mut e = EntityState::new(4, true, false);
        assert!(!e.is_fresh(0, 40));
        e.observe([0.0, 0.0], Some(0.5), false, 100, TrustSource::Vision);
        assert!(e.is_fresh(140, 40));
        assert!(!e.is_fresh(141, 40));
    }

    #[test]
    fn test_velocity_filter_blends_small_changes() {
        let mut e = EntityState::new(2, false, false);
        e.observe([0.0, 0.0], Some(0.5), false, 0, TrustSource::Vision);
        e.observe([0.02, 0.0], Some(0.5), false, 20, TrustSource::Vision);
        // sample 1 m/s, filter starts at zero
        assert_relative_eq!(e.filtered_velocity[0], 0.3, epsilon = 1e-5);
        assert_relative_eq!(e.filtered_velocity[1], 0.0);
    }

    #[test]
    fn test_radio_update_undoes_decay() {
        let mut e = EntityState::new(2, false, false);
        e.observe([0.0, 0.0], Some(0.5), false, 0, TrustSource::Vision);
        e.filtered_velocity = [0.95, 0.0];
        e.observe([0.02, 0.0], None, false, 20, TrustSource::Radio);
        // 0.95 / 0.95 + 0.3 * (1.0 - 0.95)
        assert_relative_eq!(e.filtered_velocity[0], 1.015, epsilon = 1e-5);
        assert_eq!(e.source, Some(TrustSource::Radio));
        assert_eq!(e.head_height, None);
    }

    #[test]
    fn test_teleport_resets_velocity() {
        let mut e = EntityState::new(9, true, false);
        e.observe([0.0, 0.0], Some(0.5), false, 0, TrustSource::Vision);
        e.filtered_velocity = [0.5, 0.5];
        e.observe([-10.0, 3.0], Some(0.5), false, 20, TrustSource::Vision);
        assert_eq!(e.filtered_velocity, [0.0, 0.0]);
        assert_eq!(e.abs_pos, Some([-10.0, 3.0]));
    }

    #[test]
    fn test_out_of_order_update_ignored() {
        let mut e = EntityState::new(1, true, false);
        e.observe([1.0, 1.0], Some(0.5), false, 200, TrustSource::Vision);
        e.observe([5.0, 5.0], None, true, 180, TrustSource::Radio);
        assert_eq!(e.abs_pos, Some([1.0, 1.0]));
        assert_eq!(e.last_update_ms, Some(200));
        assert!(!e.fallen);
    }

    #[test]
    fn test_ball_velocity_from_consecutive_positions() {
        let mut ball = BallState::default();
        ball.observe([0.0, 0.0, 0.042], 0, TrustSource::Vision);
        assert_eq!(ball.abs_vel, [0.0; 3]);
        ball.observe([0.1, -0.2, 0.042], 100, TrustSource::Radio);
        assert_relative_eq!(ball.abs_vel[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(ball.abs_vel[1], -2.0, epsilon = 1e-5);
        assert_relative_eq!(ball.abs_vel[2], 0.0);
    }
}
