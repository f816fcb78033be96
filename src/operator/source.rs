use std::{sync::Arc, time::Duration};

use crate::{
    foundation::error::{OpflowError, OpflowResult},
    foundation::ids::OperatorId,
    operator::{
        base::{Operator, expect_type},
        context::{EvaluationContext, StateSlot},
    },
    property::{
        abstract_property::EditableProperty,
        core_property::CoreProperty,
        registry::{OwnerBuilder, PropertyOwner, PropertyRegistry, PropertyRegistryBuilder},
        store::{CoreObject, PropertyStore, read_core_object, write_core_object},
    },
    scene::renderable::{Renderable, RenderableKind},
};

/// Produces one renderable per context and keeps it in sync with its payload.
pub trait Source: Send + Sync + 'static {
    /// Payload that owns the source's properties.
    type Value: CoreObject + 'static;

    /// Operator type name.
    const TYPE_NAME: &'static str;

    /// Build the renderable on the first evaluation in a context.
    fn create(&self, value: &Self::Value, time: Duration) -> OpflowResult<Renderable>;

    /// Bring `item` up to date for `time`.
    fn update(&self, item: &Renderable, value: &Self::Value, time: Duration) -> OpflowResult<()>;
}

/// Leaf operator that appends its renderable to the working list every frame.
pub struct SourceOperator<S: Source> {
    id: OperatorId,
    source: S,
    value: Arc<S::Value>,
    properties: Vec<Arc<dyn EditableProperty>>,
}

impl<S: Source> SourceOperator<S> {
    /// Operator producing items from `value`.
    pub fn new(source: S, value: S::Value) -> Self {
        let properties = value.store().editables();
        Self {
            id: OperatorId::next(),
            source,
            value: Arc::new(value),
            properties,
        }
    }

    /// Shared payload.
    pub fn value(&self) -> &Arc<S::Value> {
        &self.value
    }
}

impl<S: Source> Operator for SourceOperator<S> {
    fn type_name(&self) -> &'static str {
        S::TYPE_NAME
    }

    fn id(&self) -> OperatorId {
        self.id
    }

    fn properties(&self) -> &[Arc<dyn EditableProperty>] {
        &self.properties
    }

    fn evaluate(&mut self, ctx: &mut EvaluationContext<'_>) -> OpflowResult<()> {
        let live = ctx
            .state
            .get::<Renderable>()
            .filter(|item| !item.is_disposed())
            .cloned();
        let item = match live {
            Some(item) => item,
            None => {
                let item = self.source.create(&self.value, ctx.time)?;
                tracing::debug!(operator = S::TYPE_NAME, item = item.id().0, "source created");
                ctx.state.insert(item.clone());
                item
            }
        };
        self.source.update(&item, &self.value, ctx.time)?;
        ctx.renderables.push(item);
        Ok(())
    }

    fn uninitialize_for_context(&mut self, state: &mut StateSlot) {
        if let Some(item) = state.take::<Renderable>() {
            item.dispose();
        }
    }

    fn write_json(&self) -> OpflowResult<serde_json::Value> {
        Ok(serde_json::json!({
            "type": S::TYPE_NAME,
            "value": write_core_object(self.value.as_ref())?,
        }))
    }

    fn read_json(&mut self, json: &serde_json::Value) -> OpflowResult<()> {
        expect_type(json, S::TYPE_NAME)?;
        let value = json
            .get("value")
            .ok_or_else(|| OpflowError::serde("operator json is missing 'value'"))?;
        read_core_object(self.value.as_ref(), value)
    }
}

/// Register the property owners of the built-in sources.
pub fn register_sources(builder: &mut PropertyRegistryBuilder) -> &mut PropertyRegistryBuilder {
    builder.register::<RectProps>().register::<ToneProps>()
}

/// Property handles of a rectangle source.
pub struct RectProps {
    /// Width in pixels, animatable.
    pub width: CoreProperty<f64>,
    /// Height in pixels, animatable.
    pub height: CoreProperty<f64>,
}

impl PropertyOwner for RectProps {
    const OWNER: &'static str = "Rect";

    fn declare(owner: &mut OwnerBuilder<'_>) -> Self {
        Self {
            width: owner.property("Width", 100.0).animatable().finish(),
            height: owner.property("Height", 100.0).animatable().finish(),
        }
    }
}

/// Rectangle payload: a property store over [`RectProps`].
pub struct RectShape {
    props: Arc<RectProps>,
    store: PropertyStore,
}

impl RectShape {
    /// Payload with the registered defaults.
    pub fn new(registry: &PropertyRegistry) -> OpflowResult<Self> {
        Ok(Self {
            props: registry.owner::<RectProps>()?,
            store: PropertyStore::for_owner::<RectProps>(registry)?,
        })
    }

    /// Property handles.
    pub fn props(&self) -> &RectProps {
        &self.props
    }

    fn kind_at(&self, time: Duration) -> OpflowResult<RenderableKind> {
        let side = |v: f64| v.round().clamp(0.0, f64::from(u32::MAX)) as u32;
        Ok(RenderableKind::Bitmap {
            width: side(self.store.get_at(&self.props.width, time)?),
            height: side(self.store.get_at(&self.props.height, time)?),
        })
    }
}

impl CoreObject for RectShape {
    fn store(&self) -> &PropertyStore {
        &self.store
    }
}

/// Solid rectangle bitmap sized by its (animatable) width and height.
#[derive(Debug, Default)]
pub struct RectSource;

impl RectSource {
    /// Operator with a default [`RectShape`].
    pub fn operator(registry: &PropertyRegistry) -> OpflowResult<SourceOperator<Self>> {
        Ok(SourceOperator::new(Self, RectShape::new(registry)?))
    }
}

impl Source for RectSource {
    type Value = RectShape;
    const TYPE_NAME: &'static str = "RectSource";

    fn create(&self, value: &RectShape, time: Duration) -> OpflowResult<Renderable> {
        Ok(Renderable::new(value.kind_at(time)?))
    }

    fn update(&self, item: &Renderable, value: &RectShape, time: Duration) -> OpflowResult<()> {
        item.set_kind(value.kind_at(time)?)
    }
}

/// Property handles of a tone source.
pub struct ToneProps {
    /// Pitch in Hz, animatable.
    pub frequency: CoreProperty<f64>,
    /// Peak amplitude, animatable.
    pub amplitude: CoreProperty<f32>,
    /// Output sample rate in Hz. Zero fails evaluation.
    pub sample_rate: CoreProperty<u32>,
    /// Length of each rendered chunk in milliseconds.
    pub chunk_ms: CoreProperty<f64>,
}

impl PropertyOwner for ToneProps {
    const OWNER: &'static str = "Tone";

    fn declare(owner: &mut OwnerBuilder<'_>) -> Self {
        Self {
            frequency: owner.property("Frequency", 440.0).animatable().finish(),
            amplitude: owner.property("Amplitude", 0.5_f32).animatable().finish(),
            sample_rate: owner.property("SampleRate", 48_000_u32).finish(),
            chunk_ms: owner.property("ChunkMs", 20.0).finish(),
        }
    }
}

/// Sine tone payload. Each evaluation renders one chunk starting at the frame time.
pub struct Tone {
    props: Arc<ToneProps>,
    store: PropertyStore,
}

impl Tone {
    /// Payload with the registered defaults.
    pub fn new(registry: &PropertyRegistry) -> OpflowResult<Self> {
        Ok(Self {
            props: registry.owner::<ToneProps>()?,
            store: PropertyStore::for_owner::<ToneProps>(registry)?,
        })
    }

    /// Property handles.
    pub fn props(&self) -> &ToneProps {
        &self.props
    }

    /// Render the chunk starting at `time` as mono audio.
    pub fn render(&self, time: Duration) -> OpflowResult<RenderableKind> {
        let sample_rate = self.store.get(&self.props.sample_rate)?;
        if sample_rate == 0 {
            return Err(OpflowError::evaluation("tone sample rate must be > 0"));
        }
        let frequency = self.store.get_at(&self.props.frequency, time)?;
        let amplitude = self.store.get_at(&self.props.amplitude, time)?;
        let chunk_ms = self.store.get(&self.props.chunk_ms)?.max(0.0);

        let len = (f64::from(sample_rate) * chunk_ms / 1000.0).round() as usize;
        let start = time.as_secs_f64();
        let step = std::f64::consts::TAU * frequency;
        let samples = (0..len)
            .map(|i| {
                let t = start + i as f64 / f64::from(sample_rate);
                amplitude * (step * t).sin() as f32
            })
            .collect();

        Ok(RenderableKind::Audio {
            sample_rate,
            channels: 1,
            samples: Arc::new(samples),
        })
    }
}

impl CoreObject for Tone {
    fn store(&self) -> &PropertyStore {
        &self.store
    }
}

/// Sine tone audio source.
#[derive(Debug, Default)]
pub struct AudioSource;

impl AudioSource {
    /// Operator with a default [`Tone`].
    pub fn operator(registry: &PropertyRegistry) -> OpflowResult<SourceOperator<Self>> {
        Ok(SourceOperator::new(Self, Tone::new(registry)?))
    }
}

impl Source for AudioSource {
    type Value = Tone;
    const TYPE_NAME: &'static str = "AudioSource";

    fn create(&self, value: &Tone, time: Duration) -> OpflowResult<Renderable> {
        Ok(Renderable::new(value.render(time)?))
    }

    fn update(&self, item: &Renderable, value: &Tone, time: Duration) -> OpflowResult<()> {
        item.set_kind(value.render(time)?)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operator/source.rs"]
mod tests;
