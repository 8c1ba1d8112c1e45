//! Cheap deterministic hashing for presentation-only jitter.

use glam::DVec2;

/// Fast 3-value hash with xorshift
#[inline(always)]
pub fn hash3(a: u64, b: u64, c: u64) -> u64 {
    let mut seed = a
        .wrapping_mul(2654435761)
        .wrapping_add(b.wrapping_mul(2246822519))
        .wrapping_add(c);
    seed ^= seed << 13;
    seed ^= seed >> 7;
    seed ^= seed << 17;
    seed
}

/// Splitmix64 mapped to [0, 1)
#[inline(always)]
pub fn unit_random(seed: u64) -> f64 {
    let mut x = seed.wrapping_mul(0x9e3779b97f4a7c15);
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58476d1ce4e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d049bb133111eb);
    x ^= x >> 31;
    (x >> 11) as f64 / 9007199254740992.0
}

/// Offset `position` by up to `span / 2` degrees on each axis.
/// Same position and seed give the same offset; a new seed moves it.
pub fn jitter(position: DVec2, seed: u64, span: f64) -> DVec2 {
    let lon_bits = position.x.to_bits();
    let lat_bits = position.y.to_bits();
    let dx = unit_random(hash3(lon_bits, lat_bits, seed)) - 0.5;
    let dy = unit_random(hash3(lat_bits, lon_bits, seed.wrapping_add(1))) - 0.5;
    position + DVec2::new(dx, dy) * span
}
