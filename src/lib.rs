//! Opflow is a per-frame operator and node evaluation engine for non-linear video/audio
//! compositing.
//!
//! Every time the playhead moves, an [`OperatorChain`] runs its operators front to back over a
//! working list of [`Renderable`]s:
//!
//! - source operators append the items they own
//! - configure operators diff the list against their previous snapshot and attach or detach
//!   their payload exactly once per item entering or leaving scope
//! - graph operators evaluate a typed [`NodeGraph`] whose per-context state survives frames
//!
//! Operator payloads are property-backed objects: properties are declared once per owner type in
//! a [`PropertyRegistry`] and sampled, static or animated, at the exact evaluation time.
#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(dead_code)]

mod animation;
mod dsp;
mod engine;
mod foundation;
mod node;
mod operator;
mod property;
mod scene;

pub use crate::animation::ease::Ease;
pub use crate::animation::keyframe::{KeyFrame, KeyFrameAnimation, Lerp};
pub use crate::dsp::wsola::{WsolaConfig, WsolaProcessor};
pub use crate::engine::opts::EngineOpts;
pub use crate::foundation::core::{Affine, Fps, FrameIndex, Rgba8Premul, Transform2D, Vec2};
pub use crate::foundation::error::{OpflowError, OpflowResult};
pub use crate::foundation::ids::{NodeId, OperatorId, PropertyId, RenderableId};
pub use crate::foundation::pool::{BufferPool, PoolOpts, PoolStats};

pub use crate::property::abstract_property::{
    AbstractProperty, AnimatableProperty, EditableProperty, PlainProperty,
};
pub use crate::property::cell::PropertyEvent;
pub use crate::property::core_property::{CoreProperty, PropertyFlags, PropertyMeta, PropertyValue};
pub use crate::property::registry::{
    OwnerBuilder, PropertyBuilder, PropertyOwner, PropertyRegistry, PropertyRegistryBuilder,
};
pub use crate::property::store::{
    CoreObject, PropertyStore, read_core_object, sample_properties, write_core_object,
};

pub use crate::scene::renderable::{Renderable, RenderableKind, TargetKind};

pub use crate::operator::base::Operator;
pub use crate::operator::chain::{OperatorChain, OperatorSample};
pub use crate::operator::configurators::{
    Blend, BlendConfigurator, BlendMode, BlendProps, ColorAdjust, ColorAdjustConfigurator,
    ColorAdjustProps, FillConfigurator, ResolvedBlend, ResolvedBrush, ResolvedColorAdjust,
    SolidBrush, SolidBrushProps, Speed, SpeedConfigurator, SpeedProps, register_configurators,
};
pub use crate::operator::configure::{
    ConfigureOperator, Configurator, install_snapshot_pool, snapshot_pool,
};
pub use crate::operator::context::{EvaluationContext, StateSlot};
pub use crate::operator::graph_op::GraphOperator;
pub use crate::operator::source::{
    AudioSource, RectProps, RectShape, RectSource, Source, SourceOperator, Tone, ToneProps,
    register_sources,
};

pub use crate::node::base::{Node, NodeContext};
pub use crate::node::builtin::{
    AddNode, ApplyTransformNode, ConstantNode, OutputNode, PropertyNode, RectNode, StretchNode,
    TimeNode, TransformNode,
};
pub use crate::node::graph::{Compatibility, Connection, GraphInstance, NodeGraph};
pub use crate::node::socket::{
    InputBuilder, InputSocket, OutputSocket, SocketBuilder, SocketNumber, SocketSet, SocketType,
    SocketValue,
};
