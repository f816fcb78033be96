//! Stock nodes: value sources, arithmetic, transforms and the stateful renderable producers.

use std::sync::Arc;

use crate::{
    dsp::wsola::{WsolaConfig, WsolaProcessor},
    engine::opts::EngineOpts,
    foundation::core::{Affine, Transform2D, Vec2},
    foundation::error::{OpflowError, OpflowResult},
    node::{
        base::{Node, NodeContext},
        socket::{InputSocket, OutputSocket, SocketSet, SocketType},
    },
    operator::context::StateSlot,
    property::{
        abstract_property::{AbstractProperty, EditableProperty},
        core_property::{CoreProperty, PropertyValue},
        store::PropertyStore,
    },
    scene::renderable::{Renderable, RenderableKind, TargetKind},
};

/// Emits a fixed value.
pub struct ConstantNode<T> {
    sockets: SocketSet,
    value: T,
    output: OutputSocket<T>,
}

impl<T: SocketType> ConstantNode<T> {
    /// Node that always outputs `value`.
    pub fn new(value: T) -> Self {
        let mut b = SocketSet::builder();
        let output = b.output::<T>("Value");
        Self {
            sockets: b.build(),
            value,
            output,
        }
    }

    /// The `"Value"` output.
    pub fn output(&self) -> OutputSocket<T> {
        self.output
    }
}

impl<T: SocketType> Node for ConstantNode<T> {
    fn type_name(&self) -> &'static str {
        "Constant"
    }

    fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    fn evaluate(&self, ctx: &mut NodeContext<'_>) -> OpflowResult<()> {
        ctx.set_output(self.output, self.value.clone());
        Ok(())
    }
}

/// Samples an object property at the evaluation time.
pub struct PropertyNode<T: PropertyValue> {
    sockets: SocketSet,
    output: OutputSocket<T>,
    property: Arc<dyn AbstractProperty<T>>,
    editable: Option<Arc<dyn EditableProperty>>,
}

impl<T: PropertyValue> PropertyNode<T> {
    /// Sample `property` from `store`. Animatable properties are sampled through their track.
    pub fn new(store: &PropertyStore, property: &CoreProperty<T>) -> OpflowResult<Self> {
        let view: Arc<dyn AbstractProperty<T>> = if property.is_animatable() {
            Arc::new(store.animatable(property)?)
        } else {
            Arc::new(store.plain(property)?)
        };
        let mut b = SocketSet::builder();
        let output = b.output::<T>("Value");
        Ok(Self {
            sockets: b.build(),
            output,
            property: view,
            editable: store.editable(property.id()),
        })
    }

    /// The `"Value"` output.
    pub fn output(&self) -> OutputSocket<T> {
        self.output
    }
}

impl<T: PropertyValue> Node for PropertyNode<T> {
    fn type_name(&self) -> &'static str {
        "Property"
    }

    fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    fn properties(&self) -> Vec<Arc<dyn EditableProperty>> {
        self.editable.iter().cloned().collect()
    }

    fn evaluate(&self, ctx: &mut NodeContext<'_>) -> OpflowResult<()> {
        ctx.set_output(self.output, self.property.get_value_at(ctx.time));
        Ok(())
    }
}

/// Evaluation time in seconds.
pub struct TimeNode {
    sockets: SocketSet,
    seconds: OutputSocket<f64>,
}

impl TimeNode {
    /// Node with a single `"Seconds"` output.
    pub fn new() -> Self {
        let mut b = SocketSet::builder();
        let seconds = b.output_with("Seconds", 0.0_f64);
        Self {
            sockets: b.build(),
            seconds,
        }
    }

    /// The `"Seconds"` output.
    pub fn seconds(&self) -> OutputSocket<f64> {
        self.seconds
    }
}

impl Default for TimeNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for TimeNode {
    fn type_name(&self) -> &'static str {
        "Time"
    }

    fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    fn evaluate(&self, ctx: &mut NodeContext<'_>) -> OpflowResult<()> {
        ctx.set_output(self.seconds, ctx.time.as_secs_f64());
        Ok(())
    }
}

/// Adds two numbers. Both inputs accept any [`crate::SocketNumber`] type.
pub struct AddNode {
    sockets: SocketSet,
    a: InputSocket<f64>,
    b: InputSocket<f64>,
    sum: OutputSocket<f64>,
}

impl AddNode {
    /// Node with inputs `"A"` and `"B"`.
    pub fn new() -> Self {
        let mut s = SocketSet::builder();
        let a = s.input("A", 0.0_f64).accept_numbers().finish();
        let b = s.input("B", 0.0_f64).accept_numbers().finish();
        let sum = s.output("Sum");
        Self {
            sockets: s.build(),
            a,
            b,
            sum,
        }
    }

    /// The `"Sum"` output.
    pub fn sum(&self) -> OutputSocket<f64> {
        self.sum
    }
}

impl Default for AddNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for AddNode {
    fn type_name(&self) -> &'static str {
        "Add"
    }

    fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    fn evaluate(&self, ctx: &mut NodeContext<'_>) -> OpflowResult<()> {
        let sum = ctx.input(self.a)? + ctx.input(self.b)?;
        ctx.set_output(self.sum, sum);
        Ok(())
    }
}

/// Builds a [`Transform2D`] from scalar inputs.
pub struct TransformNode {
    sockets: SocketSet,
    x: InputSocket<f64>,
    y: InputSocket<f64>,
    rotation_deg: InputSocket<f64>,
    scale: InputSocket<f64>,
    transform: OutputSocket<Transform2D>,
}

impl TransformNode {
    /// Node with translate, rotation (degrees) and uniform scale inputs.
    pub fn new() -> Self {
        let mut s = SocketSet::builder();
        let x = s.input("TranslateX", 0.0_f64).accept_numbers().finish();
        let y = s.input("TranslateY", 0.0_f64).accept_numbers().finish();
        let rotation_deg = s.input("RotationDeg", 0.0_f64).accept_numbers().finish();
        let scale = s.input("Scale", 1.0_f64).accept_numbers().finish();
        let transform = s.output_with("Transform", Transform2D::default());
        Self {
            sockets: s.build(),
            x,
            y,
            rotation_deg,
            scale,
            transform,
        }
    }

    /// The `"Transform"` output.
    pub fn transform(&self) -> OutputSocket<Transform2D> {
        self.transform
    }
}

impl Default for TransformNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for TransformNode {
    fn type_name(&self) -> &'static str {
        "Transform"
    }

    fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    fn evaluate(&self, ctx: &mut NodeContext<'_>) -> OpflowResult<()> {
        let scale = ctx.input(self.scale)?;
        let transform = Transform2D {
            translate: Vec2::new(ctx.input(self.x)?, ctx.input(self.y)?),
            rotation_rad: ctx.input(self.rotation_deg)?.to_radians(),
            scale: Vec2::new(scale, scale),
            ..Transform2D::default()
        };
        ctx.set_output(self.transform, transform);
        Ok(())
    }
}

/// Writes a matrix onto every bitmap in the list as the `"transform"` hint.
///
/// The matrix input also accepts a [`Transform2D`] upstream.
pub struct ApplyTransformNode {
    sockets: SocketSet,
    matrix: InputSocket<Affine>,
    applied: OutputSocket<Affine>,
}

impl ApplyTransformNode {
    /// Hint key written on bitmaps.
    pub const HINT: &'static str = "transform";

    /// Node with a `"Matrix"` input defaulting to identity.
    pub fn new() -> Self {
        let mut s = SocketSet::builder();
        let matrix = s
            .input("Matrix", Affine::IDENTITY)
            .accept::<Transform2D>(|t| t.to_affine())
            .finish();
        let applied = s.output("Matrix");
        Self {
            sockets: s.build(),
            matrix,
            applied,
        }
    }

    /// The `"Matrix"` output, passing the applied matrix on.
    pub fn applied(&self) -> OutputSocket<Affine> {
        self.applied
    }
}

impl Default for ApplyTransformNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for ApplyTransformNode {
    fn type_name(&self) -> &'static str {
        "ApplyTransform"
    }

    fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    fn evaluate(&self, ctx: &mut NodeContext<'_>) -> OpflowResult<()> {
        let matrix = ctx.input(self.matrix)?;
        let coeffs = serde_json::to_value(matrix.as_coeffs())?;
        for item in ctx
            .renderables
            .iter()
            .filter(|r| TargetKind::Bitmap.matches(r))
        {
            item.set_hint(Self::HINT, coeffs.clone());
        }
        ctx.set_output(self.applied, matrix);
        Ok(())
    }
}

/// Owns one bitmap renderable per context, resized from its inputs every frame.
pub struct RectNode {
    sockets: SocketSet,
    width: InputSocket<f64>,
    height: InputSocket<f64>,
    shape: OutputSocket<Renderable>,
}

impl RectNode {
    /// Node with `"Width"` and `"Height"` inputs defaulting to 100.
    pub fn new() -> Self {
        let mut s = SocketSet::builder();
        let width = s.input("Width", 100.0_f64).accept_numbers().finish();
        let height = s.input("Height", 100.0_f64).accept_numbers().finish();
        let shape = s.output("Shape");
        Self {
            sockets: s.build(),
            width,
            height,
            shape,
        }
    }

    /// The `"Shape"` output.
    pub fn shape(&self) -> OutputSocket<Renderable> {
        self.shape
    }
}

impl Default for RectNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for RectNode {
    fn type_name(&self) -> &'static str {
        "Rect"
    }

    fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    fn evaluate(&self, ctx: &mut NodeContext<'_>) -> OpflowResult<()> {
        let kind = RenderableKind::Bitmap {
            width: pixels(ctx.input(self.width)?),
            height: pixels(ctx.input(self.height)?),
        };
        let live = ctx
            .state
            .get::<Renderable>()
            .filter(|item| !item.is_disposed())
            .cloned();
        let item = match live {
            Some(item) => {
                item.set_kind(kind)?;
                item
            }
            None => {
                let item = Renderable::new(kind);
                ctx.state.insert(item.clone());
                item
            }
        };
        ctx.set_output(self.shape, item);
        Ok(())
    }

    fn uninitialize_for_context(&self, state: &mut StateSlot) {
        if let Some(item) = state.take::<Renderable>() {
            item.dispose();
        }
        state.clear();
    }
}

fn pixels(v: f64) -> u32 {
    if v.is_finite() {
        v.round().clamp(0.0, f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

/// Appends its input item to the frame's renderable list.
pub struct OutputNode {
    sockets: SocketSet,
    item: InputSocket<Option<Renderable>>,
}

impl OutputNode {
    /// Node with a single optional `"Item"` input.
    pub fn new() -> Self {
        let mut s = SocketSet::builder();
        let item = s
            .input("Item", None::<Renderable>)
            .accept::<Renderable>(|r| Some(r.clone()))
            .finish();
        Self {
            sockets: s.build(),
            item,
        }
    }
}

impl Default for OutputNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for OutputNode {
    fn type_name(&self) -> &'static str {
        "Output"
    }

    fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    fn evaluate(&self, ctx: &mut NodeContext<'_>) -> OpflowResult<()> {
        if let Some(item) = ctx.input(self.item)?
            && !item.is_disposed()
            && !ctx.renderables.contains(&item)
        {
            ctx.renderables.push(item);
        }
        Ok(())
    }
}

struct StretchState {
    processor: WsolaProcessor,
    item: Renderable,
    mono: Vec<f32>,
    scratch: Vec<f32>,
}

/// Time-stretches an audio item with WSOLA. The processor lives in the context state and is
/// reset whenever the playhead seeks.
pub struct StretchNode {
    sockets: SocketSet,
    config: WsolaConfig,
    audio: InputSocket<Option<Renderable>>,
    speed: InputSocket<f32>,
    stretched: OutputSocket<Option<Renderable>>,
}

impl StretchNode {
    /// Node stretching with `config`.
    pub fn new(config: WsolaConfig) -> Self {
        let mut s = SocketSet::builder();
        let audio = s
            .input("Audio", None::<Renderable>)
            .accept::<Renderable>(|r| Some(r.clone()))
            .finish();
        let speed = s.input("Speed", 1.0_f32).accept_numbers().finish();
        let stretched = s.output_with("Audio", None::<Renderable>);
        Self {
            sockets: s.build(),
            config,
            audio,
            speed,
            stretched,
        }
    }

    /// Use the engine-wide time-stretch settings.
    pub fn with_opts(opts: &EngineOpts) -> Self {
        Self::new(opts.wsola)
    }

    /// Settings the processor is built with.
    pub fn config(&self) -> WsolaConfig {
        self.config
    }

    /// The stretched `"Audio"` output.
    pub fn stretched(&self) -> OutputSocket<Option<Renderable>> {
        self.stretched
    }
}

impl Default for StretchNode {
    fn default() -> Self {
        Self::new(WsolaConfig::default())
    }
}

impl Node for StretchNode {
    fn type_name(&self) -> &'static str {
        "Stretch"
    }

    fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    fn initialize_for_context(&self, _state: &mut StateSlot) -> OpflowResult<()> {
        self.config.validate()
    }

    fn evaluate(&self, ctx: &mut NodeContext<'_>) -> OpflowResult<()> {
        let Some(source) = ctx.input(self.audio)? else {
            ctx.set_output(self.stretched, None);
            return Ok(());
        };
        let RenderableKind::Audio {
            sample_rate,
            channels,
            samples,
        } = source.kind()
        else {
            return Err(OpflowError::evaluation(format!(
                "stretch input must be audio, got {:?}",
                source.target_kind()
            )));
        };
        let speed = ctx.input(self.speed)?;

        let fresh = match ctx.state.get::<StretchState>() {
            Some(st) => st.processor.sample_rate() != sample_rate || st.item.is_disposed(),
            None => true,
        };
        if fresh {
            ctx.state.insert(StretchState {
                processor: WsolaProcessor::new(sample_rate, self.config)?,
                item: Renderable::audio(sample_rate, 1, Vec::new()),
                mono: Vec::new(),
                scratch: Vec::new(),
            });
        }
        let seeked = ctx.seeked;
        let Some(st) = ctx.state.get_mut::<StretchState>() else {
            return Err(OpflowError::evaluation("stretch state missing"));
        };
        if seeked && !fresh {
            st.processor.reset();
        }

        downmix(&samples, channels, &mut st.mono);
        let speed_clamped = if speed.is_finite() {
            speed.clamp(WsolaProcessor::MIN_SPEED, WsolaProcessor::MAX_SPEED)
        } else {
            1.0
        };
        let room = (st.mono.len() as f64 / f64::from(speed_clamped)).ceil() as usize
            + st.processor.frame_size();
        st.scratch.clear();
        st.scratch.resize(room, 0.0);
        let written = st.processor.process(&st.mono, speed, &mut st.scratch);
        st.item.set_kind(RenderableKind::Audio {
            sample_rate,
            channels: 1,
            samples: Arc::new(st.scratch[..written].to_vec()),
        })?;
        let item = st.item.clone();

        ctx.set_output(self.stretched, Some(item));
        Ok(())
    }

    fn uninitialize_for_context(&self, state: &mut StateSlot) {
        if let Some(st) = state.take::<StretchState>() {
            st.item.dispose();
        }
        state.clear();
    }
}

fn downmix(samples: &[f32], channels: u16, out: &mut Vec<f32>) {
    out.clear();
    let channels = usize::from(channels.max(1));
    if channels == 1 {
        out.extend_from_slice(samples);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

#[cfg(test)]
#[path = "../../tests/unit/node/builtin.rs"]
mod tests;
