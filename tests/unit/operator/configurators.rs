use super::*;
use crate::{
    animation::keyframe::{KeyFrame, KeyFrameAnimation},
    operator::{
        base::Operator,
        context::{EvaluationContext, StateSlot},
    },
    property::abstract_property::AbstractProperty,
};

fn registry() -> PropertyRegistry {
    let mut builder = PropertyRegistry::builder();
    register_configurators(&mut builder);
    builder.build().unwrap()
}

fn eval(op: &mut dyn Operator, list: &mut Vec<Renderable>, secs: f64) {
    let mut state = StateSlot::new();
    let mut ctx = EvaluationContext::new(Duration::from_secs_f64(secs), list, &mut state);
    op.evaluate(&mut ctx).unwrap();
}

#[test]
fn fill_attaches_brush_and_writes_hint() {
    let registry = registry();
    let mut op = FillConfigurator::operator(&registry).unwrap();
    op.value()
        .color()
        .unwrap()
        .set_value(Rgba8Premul::from_straight_rgba(255, 0, 0, 255));

    let bmp = Renderable::bitmap(8, 8);
    let snd = Renderable::audio(48_000, 1, vec![0.0; 4]);
    let mut list = vec![bmp.clone(), snd.clone()];
    eval(&mut op, &mut list, 0.0);

    let brush = bmp
        .attachment::<SolidBrush>(op.id(), FillConfigurator::SLOT)
        .unwrap();
    assert!(Arc::ptr_eq(&brush, op.value()));
    let hint: ResolvedBrush = serde_json::from_value(bmp.hint("fill").unwrap()).unwrap();
    assert_eq!(hint.color.r, 255);
    assert_eq!(hint.opacity, 1.0);
    assert!(snd.hint("fill").is_none());

    op.exit();
    assert_eq!(bmp.attachment_count(), 0);
    assert!(bmp.hint("fill").is_none());
}

#[test]
fn color_adjust_samples_track_at_frame_time() {
    let registry = registry();
    let mut op = ColorAdjustConfigurator::operator(&registry).unwrap();
    let props = op.value().props();
    op.value()
        .store()
        .animatable(&props.brightness)
        .unwrap()
        .set_animation(Some(
            KeyFrameAnimation::from_keys(vec![
                KeyFrame::new(Duration::ZERO, 0.0),
                KeyFrame::new(Duration::from_secs(10), 1.0),
            ])
            .unwrap(),
        ))
        .unwrap();

    let bmp = Renderable::bitmap(2, 2);
    let mut list = vec![bmp.clone()];
    eval(&mut op, &mut list, 5.0);
    let hint: ResolvedColorAdjust =
        serde_json::from_value(bmp.hint(ColorAdjustConfigurator::SLOT).unwrap()).unwrap();
    assert!((hint.brightness - 0.5).abs() < 1e-9);
    assert_eq!(hint.contrast, 1.0);
}

#[test]
fn blend_mode_is_static() {
    let registry = registry();
    let op = BlendConfigurator::operator(&registry).unwrap();
    let mode = op.value().store().animatable(&op.value().props().mode);
    assert!(mode.is_err());
    op.value()
        .store()
        .set(&op.value().props().mode, BlendMode::Screen)
        .unwrap();
    assert_eq!(
        op.value().resolve(Duration::ZERO).unwrap().mode,
        BlendMode::Screen
    );
}

#[test]
fn speed_governs_audio_only_and_clamps() {
    let registry = registry();
    let mut op = SpeedConfigurator::operator(&registry).unwrap();
    op.value().speed().unwrap().set_value(50.0);

    let bmp = Renderable::bitmap(2, 2);
    let snd = Renderable::audio(48_000, 2, vec![0.0; 16]);
    let mut list = vec![bmp.clone(), snd.clone()];
    eval(&mut op, &mut list, 0.0);

    assert_eq!(snd.hint("speed"), Some(serde_json::json!(Speed::MAX)));
    assert!(bmp.hint("speed").is_none());
    assert_eq!(op.properties().len(), 1);
}
