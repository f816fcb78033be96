use super::*;
use crate::property::abstract_property::AbstractProperty;

fn registry() -> PropertyRegistry {
    let mut builder = PropertyRegistry::builder();
    register_sources(&mut builder);
    builder.build().unwrap()
}

fn eval(op: &mut dyn Operator, state: &mut StateSlot, secs: f64) -> Vec<Renderable> {
    let mut list = Vec::new();
    let mut ctx = EvaluationContext::new(Duration::from_secs_f64(secs), &mut list, state);
    op.evaluate(&mut ctx).unwrap();
    list
}

#[test]
fn rect_source_keeps_one_item_per_context() {
    let registry = registry();
    let mut op = RectSource::operator(&registry).unwrap();
    let mut state = StateSlot::new();

    let first = eval(&mut op, &mut state, 0.0);
    op.value()
        .store()
        .plain(&op.value().props().width)
        .unwrap()
        .set_value(320.4);
    let second = eval(&mut op, &mut state, 1.0);

    assert_eq!(first.len(), 1);
    assert_eq!(first[0], second[0]);
    assert_eq!(
        second[0].kind(),
        RenderableKind::Bitmap {
            width: 320,
            height: 100
        }
    );

    let mut other = StateSlot::new();
    let elsewhere = eval(&mut op, &mut other, 0.0);
    assert_ne!(elsewhere[0], first[0]);
}

#[test]
fn uninitialize_disposes_item() {
    let registry = registry();
    let mut op = RectSource::operator(&registry).unwrap();
    let mut state = StateSlot::new();
    let item = eval(&mut op, &mut state, 0.0).remove(0);

    op.uninitialize_for_context(&mut state);
    assert!(item.is_disposed());
    assert!(state.is_empty());
    op.uninitialize_for_context(&mut state);

    let fresh = eval(&mut op, &mut state, 0.0).remove(0);
    assert_ne!(fresh, item);
}

#[test]
fn tone_renders_one_chunk() {
    let registry = registry();
    let mut op = AudioSource::operator(&registry).unwrap();
    let mut state = StateSlot::new();
    let item = eval(&mut op, &mut state, 0.0).remove(0);

    let RenderableKind::Audio {
        sample_rate,
        channels,
        samples,
    } = item.kind()
    else {
        panic!("expected audio");
    };
    assert_eq!(sample_rate, 48_000);
    assert_eq!(channels, 1);
    assert_eq!(samples.len(), 960);
    assert_eq!(samples[0], 0.0);
    assert!(samples.iter().all(|s| s.abs() <= 0.5 + 1e-6));
}

#[test]
fn json_roundtrip_restores_payload() {
    let registry = registry();
    let op = RectSource::operator(&registry).unwrap();
    op.value()
        .store()
        .set(&op.value().props().height, 42.0)
        .unwrap();
    let json = op.write_json().unwrap();

    let mut copy = RectSource::operator(&registry).unwrap();
    copy.read_json(&json).unwrap();
    assert_eq!(
        copy.value().store().get(&copy.value().props().height).unwrap(),
        42.0
    );
}
