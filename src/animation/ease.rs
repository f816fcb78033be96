/// Easing curve applied to the segment that starts at a key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Ease {
    /// Constant rate.
    #[default]
    Linear,
    /// Jump to the next key's value only when it is reached.
    Hold,
    /// Quadratic, accelerating.
    InQuad,
    /// Quadratic, decelerating.
    OutQuad,
    /// Quadratic, both ends eased.
    InOutQuad,
    /// Cubic, accelerating.
    InCubic,
    /// Cubic, decelerating.
    OutCubic,
    /// Cubic, both ends eased.
    InOutCubic,
    /// Sine, accelerating.
    InSine,
    /// Sine, decelerating.
    OutSine,
    /// Sine, both ends eased.
    InOutSine,
}

impl Ease {
    /// Map linear progress `t` (clamped to `0..=1`) through the curve.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Hold => {
                if t < 1.0 {
                    0.0
                } else {
                    1.0
                }
            }
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
            Self::InSine => 1.0 - (t * std::f64::consts::FRAC_PI_2).cos(),
            Self::OutSine => (t * std::f64::consts::FRAC_PI_2).sin(),
            Self::InOutSine => -((std::f64::consts::PI * t).cos() - 1.0) / 2.0,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/ease.rs"]
mod tests;
