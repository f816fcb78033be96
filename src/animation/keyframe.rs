use std::time::Duration;

use crate::{
    animation::ease::Ease,
    foundation::core::{Rgba8Premul, Transform2D, Vec2, duration_secs},
    foundation::error::{OpflowError, OpflowResult},
};

/// Linear interpolation between two values of the same type.
pub trait Lerp: Sized {
    /// Value at `t` between `a` (0.0) and `b` (1.0).
    fn lerp(a: &Self, b: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for f32 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        (*a as f64 + ((*b as f64 - *a as f64) * t)) as f32
    }
}

impl Lerp for Vec2 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Vec2::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
    }
}

impl Lerp for Transform2D {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Self {
            translate: <Vec2 as Lerp>::lerp(&a.translate, &b.translate, t),
            rotation_rad: a.rotation_rad + (b.rotation_rad - a.rotation_rad) * t,
            scale: <Vec2 as Lerp>::lerp(&a.scale, &b.scale, t),
            anchor: <Vec2 as Lerp>::lerp(&a.anchor, &b.anchor, t),
        }
    }
}

impl Lerp for Rgba8Premul {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
            let a = f64::from(a);
            let b = f64::from(b);
            (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
        }

        Self {
            r: lerp_u8(a.r, b.r, t),
            g: lerp_u8(a.g, b.g, t),
            b: lerp_u8(a.b, b.b, t),
            a: lerp_u8(a.a, b.a, t),
        }
    }
}

/// One key of a track.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KeyFrame<T> {
    /// Time of the key, serialized as fractional seconds.
    #[serde(with = "duration_secs")]
    pub key_time: Duration,
    /// Value at `key_time`.
    pub value: T,
    /// Curve applied toward the next key.
    #[serde(default)]
    pub ease: Ease,
}

impl<T> KeyFrame<T> {
    /// Key with a linear ease.
    pub fn new(key_time: Duration, value: T) -> Self {
        Self {
            key_time,
            value,
            ease: Ease::Linear,
        }
    }

    /// Replace the ease.
    pub fn with_ease(mut self, ease: Ease) -> Self {
        self.ease = ease;
        self
    }
}

/// A keyframe track. Keys are kept sorted by `key_time`.
///
/// The track only *covers* the closed range between its first and last key; a property with an
/// attached track falls back to its static value outside that range.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(
    try_from = "RawKeyFrames<T>",
    bound(deserialize = "T: serde::Deserialize<'de>")
)]
pub struct KeyFrameAnimation<T> {
    keys: Vec<KeyFrame<T>>,
}

#[derive(serde::Deserialize)]
struct RawKeyFrames<T> {
    keys: Vec<KeyFrame<T>>,
}

impl<T> TryFrom<RawKeyFrames<T>> for KeyFrameAnimation<T> {
    type Error = OpflowError;

    fn try_from(raw: RawKeyFrames<T>) -> Result<Self, Self::Error> {
        Self::from_keys(raw.keys)
    }
}

impl<T> Default for KeyFrameAnimation<T> {
    fn default() -> Self {
        Self { keys: Vec::new() }
    }
}

impl<T> KeyFrameAnimation<T> {
    /// Empty track.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a track from keys that are already sorted by time.
    pub fn from_keys(keys: Vec<KeyFrame<T>>) -> OpflowResult<Self> {
        if !keys.windows(2).all(|w| w[0].key_time <= w[1].key_time) {
            return Err(OpflowError::animation(
                "keyframes must be sorted by key_time",
            ));
        }
        Ok(Self { keys })
    }

    /// Insert a key, keeping order. Keys sharing a time keep insertion order.
    pub fn insert(&mut self, key: KeyFrame<T>) {
        let idx = self.keys.partition_point(|k| k.key_time <= key.key_time);
        self.keys.insert(idx, key);
    }

    /// Remove the key at `index`, if any.
    pub fn remove_at(&mut self, index: usize) -> Option<KeyFrame<T>> {
        (index < self.keys.len()).then(|| self.keys.remove(index))
    }

    /// Keys in time order.
    pub fn keys(&self) -> &[KeyFrame<T>] {
        &self.keys
    }

    /// Whether the track has no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Closed time range covered by this track.
    pub fn span(&self) -> Option<(Duration, Duration)> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        Some((first.key_time, last.key_time))
    }

    /// Whether `time` lies within `[first, last]`.
    pub fn covers(&self, time: Duration) -> bool {
        self.span()
            .is_some_and(|(start, end)| start <= time && time <= end)
    }
}

impl<T> KeyFrameAnimation<T>
where
    T: Lerp + Clone,
{
    /// Interpolated value at `time`, clamping to the first/last key outside the span.
    pub fn interpolate(&self, time: Duration) -> Option<T> {
        let idx = self.keys.partition_point(|k| k.key_time <= time);

        if idx == 0 {
            return self.keys.first().map(|k| k.value.clone());
        }
        if idx >= self.keys.len() {
            return self.keys.last().map(|k| k.value.clone());
        }

        let a = &self.keys[idx - 1];
        let b = &self.keys[idx];
        let denom = b.key_time.saturating_sub(a.key_time).as_secs_f64();
        if denom <= 0.0 {
            return Some(a.value.clone());
        }

        let t = time.saturating_sub(a.key_time).as_secs_f64() / denom;
        Some(T::lerp(&a.value, &b.value, a.ease.apply(t)))
    }

    /// Value at `time` if the track covers it.
    pub fn sample(&self, time: Duration) -> Option<T> {
        if !self.covers(time) {
            return None;
        }
        self.interpolate(time)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/keyframe.rs"]
mod tests;
