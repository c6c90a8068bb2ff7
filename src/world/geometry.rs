//! Small vector helpers for perceptor geometry

/// Spherical (distance, horizontal angle°, vertical angle°) → cartesian
#[inline]
pub fn sph_to_cart(sph: [f32; 3]) -> [f32; 3] {
    let [dist, h, v] = sph;
    let (sin_h, cos_h) = h.to_radians().sin_cos();
    let (sin_v, cos_v) = v.to_radians().sin_cos();
    [dist * cos_v * cos_h, dist * cos_v * sin_h, dist * sin_v]
}

/// Rotate a vector about the vertical axis
#[inline]
pub fn rotate_z(v: [f32; 3], angle_deg: f32) -> [f32; 3] {
    let (s, c) = angle_deg.to_radians().sin_cos();
    [v[0] * c - v[1] * s, v[0] * s + v[1] * c, v[2]]
}

#[inline]
pub fn add(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn norm2(v: [f32; 2]) -> f32 {
    v[0].hypot(v[1])
}
