use std::time::Duration;

use crate::foundation::error::{OpflowError, OpflowResult};

pub use kurbo::{Affine, Vec2};

/// Absolute 0-based frame index on the timeline.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frame rate as an exact ratio. Both terms are non-zero, including when deserialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "FpsRepr")]
pub struct Fps {
    num: u32,
    den: u32,
}

#[derive(serde::Deserialize)]
struct FpsRepr {
    num: u32,
    den: u32,
}

impl TryFrom<FpsRepr> for Fps {
    type Error = OpflowError;

    fn try_from(raw: FpsRepr) -> OpflowResult<Self> {
        Self::new(raw.num, raw.den)
    }
}

impl Fps {
    /// Create a validated rate. Both terms must be non-zero.
    pub fn new(num: u32, den: u32) -> OpflowResult<Self> {
        if den == 0 {
            return Err(OpflowError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(OpflowError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Numerator (frames).
    pub fn num(self) -> u32 {
        self.num
    }

    /// Denominator (seconds).
    pub fn den(self) -> u32 {
        self.den
    }

    /// Frames per second as a float.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Length of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Presentation time of the first instant of `frame`.
    ///
    /// Exact integer math, floored to the nanosecond. Saturates instead of overflowing.
    pub fn frame_to_time(self, frame: FrameIndex) -> Duration {
        const NANOS: u128 = 1_000_000_000;
        let nanos = u128::from(frame.0) * u128::from(self.den) * NANOS / u128::from(self.num);
        let secs = u64::try_from(nanos / NANOS).unwrap_or(u64::MAX);
        Duration::new(secs, (nanos % NANOS) as u32)
    }

    /// Frame containing `time`.
    pub fn time_to_frame_floor(self, time: Duration) -> FrameIndex {
        FrameIndex((time.as_secs_f64() * self.as_f64()).floor().max(0.0) as u64)
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red, premultiplied.
    pub r: u8,
    /// Green, premultiplied.
    pub g: u8,
    /// Blue, premultiplied.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Opaque white.
    pub fn white() -> Self {
        Self {
            r: 255,
            g: 255,
            b: 255,
            a: 255,
        }
    }

    /// Premultiply straight (non-premultiplied) components.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }
}

/// Decomposed 2D transform, composed into an [`Affine`] by [`Transform2D::to_affine`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transform2D {
    /// Translation in parent space.
    pub translate: Vec2,
    /// Rotation in radians.
    pub rotation_rad: f64,
    /// Non-uniform scale. Defaults to `(1, 1)`.
    pub scale: Vec2,
    /// Pivot for rotation and scale, in local space.
    pub anchor: Vec2,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            translate: Vec2::ZERO,
            rotation_rad: 0.0,
            scale: Vec2::new(1.0, 1.0),
            anchor: Vec2::ZERO,
        }
    }
}

impl Transform2D {
    /// Compose as `T(translate) * T(anchor) * R * S * T(-anchor)`.
    pub fn to_affine(self) -> Affine {
        let t_translate = Affine::translate(self.translate);
        let t_anchor = Affine::translate(self.anchor);
        let t_unanchor = Affine::translate(-self.anchor);
        let t_rotate = Affine::rotate(self.rotation_rad);
        let t_scale = Affine::scale_non_uniform(self.scale.x, self.scale.y);

        // Canonical order:
        // T(translate) * T(anchor) * R(rot) * S(scale) * T(-anchor)
        t_translate * t_anchor * t_rotate * t_scale * t_unanchor
    }
}

/// Serde helper storing a [`Duration`] as fractional seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
