//! Hinge joint perceptor table
//!
//! Joint indices interleave left/right so mirrored joints are adjacent.

/// Number of hinge joints on the heterogeneous NAO model (toes included)
pub const JOINT_COUNT: usize = 24;

/// Perceptor names in joint index order
pub const JOINT_NAMES: [&str; JOINT_COUNT] = [
    "hj1", "hj2", // head pan, tilt
    "llj1", "rlj1", "llj2", "rlj2", "llj3", "rlj3", "llj4", "rlj4", "llj5", "rlj5", "llj6",
    "rlj6", // legs
    "laj1", "raj1", "laj2", "raj2", "laj3", "raj3", "laj4", "raj4", // arms
    "llj7", "rlj7", // toes
];

/// Joints whose perceptor sign is flipped so left and right move symmetrically
const MIRRORED_JOINTS: [&str; 5] = ["rlj2", "rlj6", "raj2", "laj3", "laj4"];

/// Index of a joint perceptor name
pub fn joint_index(name: &[u8]) -> Option<usize> {
    JOINT_NAMES.iter().position(|n| n.as_bytes() == name)
}

/// Whether the perceptor reading must be negated
pub fn is_mirrored(index: usize) -> bool {
    JOINT_NAMES
        .get(index)
        .is_some_and(|name| MIRRORED_JOINTS.contains(name))
}

/// Angle and angular velocity of one joint
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JointReading {
    /// Angle in degrees (after symmetry fix)
    pub position_deg: f32,
    /// Angular velocity in rad/s, finite difference over one simulation step
    pub speed_rad_s: f32,
}
