use super::*;
use crate::{
    animation::keyframe::KeyFrame,
    foundation::error::OpflowError,
    property::{
        registry::{OwnerBuilder, PropertyOwner, PropertyRegistry},
        store::PropertyStore,
    },
};

struct Gain {
    level: CoreProperty<f64>,
    muted: CoreProperty<bool>,
}

impl PropertyOwner for Gain {
    const OWNER: &'static str = "Gain";

    fn declare(owner: &mut OwnerBuilder<'_>) -> Self {
        Self {
            level: owner.property("Level", 1.0).animatable().finish(),
            muted: owner.property("Muted", false).finish(),
        }
    }
}

fn setup() -> (Arc<Gain>, PropertyStore) {
    let mut builder = PropertyRegistry::builder();
    builder.register::<Gain>();
    let registry = builder.build().unwrap();
    let gain = registry.owner::<Gain>().unwrap();
    let store = PropertyStore::for_owner::<Gain>(&registry).unwrap();
    (gain, store)
}

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

#[test]
fn plain_property_ignores_time() {
    let (gain, store) = setup();
    let muted = store.plain(&gain.muted).unwrap();
    assert!(!muted.default_value());
    muted.set_value(true);
    assert!(muted.get_value_at(secs(3.0)));
}

#[test]
fn plain_view_of_animatable_ignores_track() {
    let (gain, store) = setup();
    let anim = store.animatable(&gain.level).unwrap();
    anim.set_animation(Some(
        KeyFrameAnimation::from_keys(vec![
            KeyFrame::new(secs(0.0), 0.0),
            KeyFrame::new(secs(2.0), 2.0),
        ])
        .unwrap(),
    ))
    .unwrap();

    assert_eq!(anim.get_value_at(secs(1.0)), 1.0);
    assert_eq!(anim.get_value_at(secs(0.5)), 0.5);
    let plain = store.plain(&gain.level).unwrap();
    assert_eq!(plain.get_value_at(secs(0.5)), 1.0);
}

#[test]
fn animatable_view_requires_flag() {
    let (gain, store) = setup();
    assert!(matches!(
        store.animatable(&gain.muted),
        Err(OpflowError::Validation(_))
    ));
}

#[test]
fn observable_sees_value_and_track_changes() {
    let (gain, store) = setup();
    let level = store.animatable(&gain.level).unwrap();
    let rx = level.get_observable();

    level.set_value(0.5);
    level.set_value(0.5);
    level.set_animation(Some(KeyFrameAnimation::new())).unwrap();

    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], PropertyEvent::ValueChanged(0.5));
    assert!(matches!(events[1], PropertyEvent::AnimationChanged(Some(_))));
}

#[test]
fn wrong_runtime_type_is_rejected() {
    let (gain, store) = setup();
    let level = store.animatable(&gain.level).unwrap();

    let err = level.try_set(&"loud").unwrap_err();
    assert!(matches!(err, OpflowError::TypeMismatch { .. }));
    assert!(level.set_value_dyn(&7_i32).is_err());
    assert_eq!(level.get_value(), 1.0);

    level.set_value_dyn(&0.25_f64).unwrap();
    assert_eq!(level.get_value(), 0.25);
}

#[test]
fn handles_share_one_cell() {
    let (gain, store) = setup();
    let a = store.plain(&gain.level).unwrap();
    let b = store.animatable(&gain.level).unwrap();
    a.set_value(9.0);
    assert_eq!(b.get_value(), 9.0);
}
