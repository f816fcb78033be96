use super::*;
use crate::animation::keyframe::KeyFrame;

fn cell(animatable: bool, notifies: bool) -> (PropertyCell<f64>, Receiver<PropertyId>) {
    let feed = Arc::new(Observers::default());
    let rx = feed.subscribe();
    let sample: Sampler<f64> = |a, t| a.sample(t);
    let sampler = animatable.then_some(sample);
    (
        PropertyCell::new(PropertyId(7), Arc::from("Opacity"), notifies, 1.0, sampler, feed),
        rx,
    )
}

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

#[test]
fn emits_only_on_change() {
    let (c, _) = cell(false, false);
    let rx = c.subscribe();

    assert!(!c.set(1.0));
    assert!(rx.try_recv().is_err());

    assert!(c.set(0.5));
    assert_eq!(rx.try_recv().unwrap(), PropertyEvent::ValueChanged(0.5));
    assert!(rx.try_recv().is_err());
}

#[test]
fn dropped_receivers_are_pruned() {
    let (c, _) = cell(false, false);
    let keep = c.subscribe();
    drop(c.subscribe());
    assert_eq!(c.observer_count(), 2);

    c.set(2.0);
    assert_eq!(c.observer_count(), 1);
    assert_eq!(keep.try_recv().unwrap(), PropertyEvent::ValueChanged(2.0));
}

#[test]
fn animation_rejected_on_plain_cell() {
    let (c, _) = cell(false, false);
    let err = c
        .set_animation(Some(Arc::new(KeyFrameAnimation::new())))
        .unwrap_err();
    assert!(matches!(err, OpflowError::Validation(_)));
    assert!(c.animation().is_none());
}

#[test]
fn sampled_value_falls_back_outside_track() {
    let (c, _) = cell(true, false);
    let anim = KeyFrameAnimation::from_keys(vec![
        KeyFrame::new(secs(1.0), 0.0),
        KeyFrame::new(secs(3.0), 10.0),
    ])
    .unwrap();
    let anims = c.subscribe_animation();
    c.set_animation(Some(Arc::new(anim))).unwrap();
    assert!(anims.try_recv().unwrap().is_some());

    assert_eq!(c.get_at(secs(2.0)), 5.0);
    assert_eq!(c.get_at(secs(0.0)), 1.0);
    assert_eq!(c.get_at(secs(4.0)), 1.0);

    c.set_animation(None).unwrap();
    assert!(anims.try_recv().unwrap().is_none());
    assert_eq!(c.get_at(secs(2.0)), 1.0);
}

#[test]
fn owner_feed_only_for_notifying_cells() {
    let (quiet, quiet_rx) = cell(false, false);
    quiet.set(3.0);
    assert!(quiet_rx.try_recv().is_err());

    let (loud, loud_rx) = cell(false, true);
    loud.set(3.0);
    assert_eq!(loud_rx.try_recv().unwrap(), PropertyId(7));
}

#[test]
fn erased_setters_type_check() {
    let (c, _) = cell(true, false);
    let err = c.set_any(&"nope", "&str").unwrap_err();
    assert!(matches!(
        err,
        OpflowError::TypeMismatch { found: "&str", .. }
    ));
    assert_eq!(c.get(), 1.0);

    let err = c.set_value_json(&serde_json::json!("x")).unwrap_err();
    assert!(matches!(
        err,
        OpflowError::TypeMismatch {
            found: "json string",
            ..
        }
    ));
    assert!(c.set_value_json(&serde_json::json!(0.25)).unwrap());
    assert_eq!(c.value_json().unwrap(), serde_json::json!(0.25));
}
