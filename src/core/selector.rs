//! Maps a uniform draw onto cumulative bounds.

use rand::Rng;

/// Index of the first bound at or above `draw`, scanning from the front.
///
/// `None` when `bounds` is empty or every bound lies below the draw.
/// Out-degree is a handful of hops, so a linear scan is enough.
pub fn select_with_draw(bounds: &[f32], draw: f32) -> Option<usize> {
    bounds.iter().position(|&bound| draw <= bound)
}

/// Draw uniformly from `[0, 1)` and select against `bounds`.
pub fn select<R: Rng + ?Sized>(bounds: &[f32], rng: &mut R) -> Option<usize> {
    if bounds.is_empty() {
        return None;
    }
    let draw: f32 = rng.gen();
    select_with_draw(bounds, draw)
}
