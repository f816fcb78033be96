//! Built-in configure operators and their editable payloads.
//!
//! Each configurator attaches its payload to governed items under its own slot and writes the
//! payload sampled at the frame time into a hint of the same name, for renderers to pick up.

use std::{sync::Arc, time::Duration};

use crate::{
    foundation::core::Rgba8Premul,
    foundation::error::OpflowResult,
    foundation::ids::OperatorId,
    operator::configure::{ConfigureOperator, Configurator},
    property::{
        abstract_property::AnimatableProperty,
        core_property::CoreProperty,
        registry::{OwnerBuilder, PropertyOwner, PropertyRegistry, PropertyRegistryBuilder},
        store::{CoreObject, PropertyStore},
    },
    scene::renderable::{Renderable, TargetKind},
};

/// Register the property owners of every built-in configurator payload.
pub fn register_configurators(builder: &mut PropertyRegistryBuilder) -> &mut PropertyRegistryBuilder {
    builder
        .register::<SolidBrushProps>()
        .register::<ColorAdjustProps>()
        .register::<BlendProps>()
        .register::<SpeedProps>()
}

fn attach_payload<V: Send + Sync + 'static>(
    owner: OperatorId,
    slot: &'static str,
    item: &Renderable,
    value: &Arc<V>,
) {
    item.attach(owner, slot, value.clone());
}

fn detach_payload(owner: OperatorId, slot: &'static str, item: &Renderable) {
    item.detach(owner, slot);
    item.remove_hint(slot);
}

/// Property handles of a solid brush.
pub struct SolidBrushProps {
    /// Brush color, animatable.
    pub color: CoreProperty<Rgba8Premul>,
    /// Opacity in `0..=1`, animatable.
    pub opacity: CoreProperty<f64>,
}

impl PropertyOwner for SolidBrushProps {
    const OWNER: &'static str = "SolidBrush";

    fn declare(owner: &mut OwnerBuilder<'_>) -> Self {
        Self {
            color: owner
                .property("Color", Rgba8Premul::white())
                .animatable()
                .notifies()
                .finish(),
            opacity: owner.property("Opacity", 1.0).animatable().finish(),
        }
    }
}

/// Solid color brush payload.
pub struct SolidBrush {
    props: Arc<SolidBrushProps>,
    store: PropertyStore,
}

/// A [`SolidBrush`] sampled at one instant.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResolvedBrush {
    /// Sampled color.
    pub color: Rgba8Premul,
    /// Sampled opacity.
    pub opacity: f64,
}

impl SolidBrush {
    /// Payload with the registered defaults.
    pub fn new(registry: &PropertyRegistry) -> OpflowResult<Self> {
        Ok(Self {
            props: registry.owner::<SolidBrushProps>()?,
            store: PropertyStore::for_owner::<SolidBrushProps>(registry)?,
        })
    }

    /// Editor view of the color.
    pub fn color(&self) -> OpflowResult<AnimatableProperty<Rgba8Premul>> {
        self.store.animatable(&self.props.color)
    }

    /// Editor view of the opacity.
    pub fn opacity(&self) -> OpflowResult<AnimatableProperty<f64>> {
        self.store.animatable(&self.props.opacity)
    }

    /// Sample every property at `time`.
    pub fn resolve(&self, time: Duration) -> OpflowResult<ResolvedBrush> {
        Ok(ResolvedBrush {
            color: self.store.get_at(&self.props.color, time)?,
            opacity: self.store.get_at(&self.props.opacity, time)?.clamp(0.0, 1.0),
        })
    }
}

impl CoreObject for SolidBrush {
    fn store(&self) -> &PropertyStore {
        &self.store
    }
}

/// Paints governed bitmaps with a [`SolidBrush`].
#[derive(Debug, Default)]
pub struct FillConfigurator;

impl FillConfigurator {
    /// Attachment slot and hint key on governed items.
    pub const SLOT: &'static str = "fill";

    /// Configure operator with a default payload.
    pub fn operator(registry: &PropertyRegistry) -> OpflowResult<ConfigureOperator<Self>> {
        Ok(ConfigureOperator::new(Self, SolidBrush::new(registry)?))
    }
}

impl Configurator for FillConfigurator {
    type Value = SolidBrush;
    const TYPE_NAME: &'static str = "Fill";

    fn target(&self) -> TargetKind {
        TargetKind::Bitmap
    }

    fn on_attached(&mut self, owner: OperatorId, item: &Renderable, value: &Arc<SolidBrush>) {
        attach_payload(owner, Self::SLOT, item, value);
    }

    fn on_detached(&mut self, owner: OperatorId, item: &Renderable, _value: &Arc<SolidBrush>) {
        detach_payload(owner, Self::SLOT, item);
    }

    fn update(
        &mut self,
        _owner: OperatorId,
        item: &Renderable,
        value: &Arc<SolidBrush>,
        time: Duration,
    ) -> OpflowResult<()> {
        item.set_hint(Self::SLOT, serde_json::to_value(value.resolve(time)?)?);
        Ok(())
    }
}

/// Property handles of a color adjustment.
pub struct ColorAdjustProps {
    /// Additive brightness offset.
    pub brightness: CoreProperty<f64>,
    /// Contrast multiplier.
    pub contrast: CoreProperty<f64>,
    /// Saturation multiplier.
    pub saturation: CoreProperty<f64>,
}

impl PropertyOwner for ColorAdjustProps {
    const OWNER: &'static str = "ColorAdjust";

    fn declare(owner: &mut OwnerBuilder<'_>) -> Self {
        Self {
            brightness: owner.property("Brightness", 0.0).animatable().finish(),
            contrast: owner.property("Contrast", 1.0).animatable().finish(),
            saturation: owner.property("Saturation", 1.0).animatable().finish(),
        }
    }
}

/// Color adjustment payload.
pub struct ColorAdjust {
    props: Arc<ColorAdjustProps>,
    store: PropertyStore,
}

/// A [`ColorAdjust`] sampled at one instant.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResolvedColorAdjust {
    /// Sampled brightness.
    pub brightness: f64,
    /// Sampled contrast.
    pub contrast: f64,
    /// Sampled saturation.
    pub saturation: f64,
}

impl ColorAdjust {
    /// Payload with the registered defaults.
    pub fn new(registry: &PropertyRegistry) -> OpflowResult<Self> {
        Ok(Self {
            props: registry.owner::<ColorAdjustProps>()?,
            store: PropertyStore::for_owner::<ColorAdjustProps>(registry)?,
        })
    }

    /// Property handles.
    pub fn props(&self) -> &ColorAdjustProps {
        &self.props
    }

    /// Sample every property at `time`.
    pub fn resolve(&self, time: Duration) -> OpflowResult<ResolvedColorAdjust> {
        Ok(ResolvedColorAdjust {
            brightness: self.store.get_at(&self.props.brightness, time)?,
            contrast: self.store.get_at(&self.props.contrast, time)?.max(0.0),
            saturation: self.store.get_at(&self.props.saturation, time)?.max(0.0),
        })
    }
}

impl CoreObject for ColorAdjust {
    fn store(&self) -> &PropertyStore {
        &self.store
    }
}

/// Applies a [`ColorAdjust`] to bitmaps.
#[derive(Debug, Default)]
pub struct ColorAdjustConfigurator;

impl ColorAdjustConfigurator {
    /// Attachment slot and hint key on governed items.
    pub const SLOT: &'static str = "color_adjust";

    /// Configure operator with a default payload.
    pub fn operator(registry: &PropertyRegistry) -> OpflowResult<ConfigureOperator<Self>> {
        Ok(ConfigureOperator::new(Self, ColorAdjust::new(registry)?))
    }
}

impl Configurator for ColorAdjustConfigurator {
    type Value = ColorAdjust;
    const TYPE_NAME: &'static str = "ColorAdjust";

    fn target(&self) -> TargetKind {
        TargetKind::Bitmap
    }

    fn on_attached(&mut self, owner: OperatorId, item: &Renderable, value: &Arc<ColorAdjust>) {
        attach_payload(owner, Self::SLOT, item, value);
    }

    fn on_detached(&mut self, owner: OperatorId, item: &Renderable, _value: &Arc<ColorAdjust>) {
        detach_payload(owner, Self::SLOT, item);
    }

    fn update(
        &mut self,
        _owner: OperatorId,
        item: &Renderable,
        value: &Arc<ColorAdjust>,
        time: Duration,
    ) -> OpflowResult<()> {
        item.set_hint(Self::SLOT, serde_json::to_value(value.resolve(time)?)?);
        Ok(())
    }
}

/// How a bitmap is composited onto what lies below it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BlendMode {
    /// Source over destination.
    #[default]
    Normal,
    /// Product of both colors.
    Multiply,
    /// Inverse of the product of the inverses.
    Screen,
    /// Multiply or screen depending on the destination.
    Overlay,
    /// Sum, clamped.
    Add,
    /// Absolute difference.
    Difference,
}

/// Property handles of a blend setting.
pub struct BlendProps {
    /// Blend mode.
    pub mode: CoreProperty<BlendMode>,
    /// Layer opacity, animatable.
    pub opacity: CoreProperty<f64>,
}

impl PropertyOwner for BlendProps {
    const OWNER: &'static str = "Blend";

    fn declare(owner: &mut OwnerBuilder<'_>) -> Self {
        Self {
            mode: owner.property("Mode", BlendMode::Normal).notifies().finish(),
            opacity: owner.property("Opacity", 1.0).animatable().finish(),
        }
    }
}

/// Blend mode and opacity payload.
pub struct Blend {
    props: Arc<BlendProps>,
    store: PropertyStore,
}

/// A [`Blend`] sampled at one instant.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResolvedBlend {
    /// Blend mode.
    pub mode: BlendMode,
    /// Sampled opacity.
    pub opacity: f64,
}

impl Blend {
    /// Payload with the registered defaults.
    pub fn new(registry: &PropertyRegistry) -> OpflowResult<Self> {
        Ok(Self {
            props: registry.owner::<BlendProps>()?,
            store: PropertyStore::for_owner::<BlendProps>(registry)?,
        })
    }

    /// Property handles.
    pub fn props(&self) -> &BlendProps {
        &self.props
    }

    /// Sample every property at `time`.
    pub fn resolve(&self, time: Duration) -> OpflowResult<ResolvedBlend> {
        Ok(ResolvedBlend {
            mode: self.store.get(&self.props.mode)?,
            opacity: self.store.get_at(&self.props.opacity, time)?.clamp(0.0, 1.0),
        })
    }
}

impl CoreObject for Blend {
    fn store(&self) -> &PropertyStore {
        &self.store
    }
}

/// Applies a [`Blend`] to bitmaps.
#[derive(Debug, Default)]
pub struct BlendConfigurator;

impl BlendConfigurator {
    /// Attachment slot and hint key on governed items.
    pub const SLOT: &'static str = "blend";

    /// Configure operator with a default payload.
    pub fn operator(registry: &PropertyRegistry) -> OpflowResult<ConfigureOperator<Self>> {
        Ok(ConfigureOperator::new(Self, Blend::new(registry)?))
    }
}

impl Configurator for BlendConfigurator {
    type Value = Blend;
    const TYPE_NAME: &'static str = "Blend";

    fn target(&self) -> TargetKind {
        TargetKind::Bitmap
    }

    fn on_attached(&mut self, owner: OperatorId, item: &Renderable, value: &Arc<Blend>) {
        attach_payload(owner, Self::SLOT, item, value);
    }

    fn on_detached(&mut self, owner: OperatorId, item: &Renderable, _value: &Arc<Blend>) {
        detach_payload(owner, Self::SLOT, item);
    }

    fn update(
        &mut self,
        _owner: OperatorId,
        item: &Renderable,
        value: &Arc<Blend>,
        time: Duration,
    ) -> OpflowResult<()> {
        item.set_hint(Self::SLOT, serde_json::to_value(value.resolve(time)?)?);
        Ok(())
    }
}

/// Property handles of a speed setting.
pub struct SpeedProps {
    /// Playback rate, animatable.
    pub speed: CoreProperty<f32>,
}

impl PropertyOwner for SpeedProps {
    const OWNER: &'static str = "Speed";

    fn declare(owner: &mut OwnerBuilder<'_>) -> Self {
        Self {
            speed: owner.property("Speed", 1.0_f32).animatable().finish(),
        }
    }
}

/// Time-stretch factor for audio items.
pub struct Speed {
    props: Arc<SpeedProps>,
    store: PropertyStore,
}

impl Speed {
    /// Slowest rate [`Speed::resolve`] returns.
    pub const MIN: f32 = 0.1;
    /// Fastest rate [`Speed::resolve`] returns.
    pub const MAX: f32 = 10.0;

    /// Payload with the registered defaults.
    pub fn new(registry: &PropertyRegistry) -> OpflowResult<Self> {
        Ok(Self {
            props: registry.owner::<SpeedProps>()?,
            store: PropertyStore::for_owner::<SpeedProps>(registry)?,
        })
    }

    /// Editor view of the rate.
    pub fn speed(&self) -> OpflowResult<AnimatableProperty<f32>> {
        self.store.animatable(&self.props.speed)
    }

    /// Rate at `time`, clamped to `MIN..=MAX`.
    pub fn resolve(&self, time: Duration) -> OpflowResult<f32> {
        Ok(self
            .store
            .get_at(&self.props.speed, time)?
            .clamp(Self::MIN, Self::MAX))
    }
}

impl CoreObject for Speed {
    fn store(&self) -> &PropertyStore {
        &self.store
    }
}

/// Applies a [`Speed`] to audio items.
#[derive(Debug, Default)]
pub struct SpeedConfigurator;

impl SpeedConfigurator {
    /// Attachment slot and hint key on governed items.
    pub const SLOT: &'static str = "speed";

    /// Configure operator with a default payload.
    pub fn operator(registry: &PropertyRegistry) -> OpflowResult<ConfigureOperator<Self>> {
        Ok(ConfigureOperator::new(Self, Speed::new(registry)?))
    }
}

impl Configurator for SpeedConfigurator {
    type Value = Speed;
    const TYPE_NAME: &'static str = "Speed";

    fn target(&self) -> TargetKind {
        TargetKind::Audio
    }

    fn on_attached(&mut self, owner: OperatorId, item: &Renderable, value: &Arc<Speed>) {
        attach_payload(owner, Self::SLOT, item, value);
    }

    fn on_detached(&mut self, owner: OperatorId, item: &Renderable, _value: &Arc<Speed>) {
        detach_payload(owner, Self::SLOT, item);
    }

    fn update(
        &mut self,
        _owner: OperatorId,
        item: &Renderable,
        value: &Arc<Speed>,
        time: Duration,
    ) -> OpflowResult<()> {
        item.set_hint(Self::SLOT, serde_json::json!(value.resolve(time)?));
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operator/configurators.rs"]
mod tests;
