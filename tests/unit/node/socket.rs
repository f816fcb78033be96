use super::*;

fn convert(set: &SocketSet, input: usize, value: &dyn SocketValue) -> Option<Box<dyn SocketValue>> {
    let decl = &set.inputs[input];
    let receiver = decl.receivers.iter().find(|r| r.source == value.value_type())?;
    (receiver.convert)(value.as_any())
}

#[test]
fn handles_index_in_declaration_order() {
    let mut b = SocketSet::builder();
    let a = b.input("A", 1.0_f64).finish();
    let c = b.input("C", String::from("x")).finish();
    let out = b.output::<f64>("Out");
    let set = b.build();

    assert_eq!((a.index(), c.index(), out.index()), (0, 1, 0));
    assert_eq!(set.input_index("C"), Some(1));
    assert_eq!(set.output_index("Out"), Some(0));
    assert_eq!(set.input_index("Out"), None);
    assert_eq!(set.input_names().collect::<Vec<_>>(), ["A", "C"]);
}

#[test]
fn defaults_are_stored_per_input() {
    let mut b = SocketSet::builder();
    b.input("Size", 100.0_f32).finish();
    let set = b.build();
    let default: &dyn SocketValue = &*set.inputs[0].default;
    assert_eq!(default.downcast_ref::<f32>(), Some(&100.0));
    assert!(default.is::<f32>());
    assert!(!default.is::<f64>());
}

#[test]
fn accept_numbers_converts_through_f64() {
    let mut b = SocketSet::builder();
    b.input("Gain", 0.0_f32).accept_numbers().finish();
    let set = b.build();

    let from_int = convert(&set, 0, &7_i32).unwrap();
    assert_eq!(from_int.downcast_ref::<f32>(), Some(&7.0));
    let from_double = convert(&set, 0, &0.25_f64).unwrap();
    assert_eq!(from_double.downcast_ref::<f32>(), Some(&0.25));
    assert!(convert(&set, 0, &"text").is_none());
    // The declared type itself needs no receiver.
    assert!(set.inputs[0].receivers.iter().all(|r| r.source != TypeId::of::<f32>()));
}

#[test]
fn later_receiver_replaces_earlier_one() {
    let mut b = SocketSet::builder();
    b.input("Label", String::new())
        .accept::<u32>(|n| format!("first {n}"))
        .accept::<u32>(|n| format!("second {n}"))
        .finish();
    let set = b.build();
    assert_eq!(set.inputs[0].receivers.len(), 1);
    let converted = convert(&set, 0, &3_u32).unwrap();
    assert_eq!(converted.downcast_ref::<String>().unwrap(), "second 3");
}

#[test]
fn outputs_may_carry_initial_values() {
    let mut b = SocketSet::builder();
    b.output::<f64>("Plain");
    b.output_with("Seeded", 2.5_f64);
    let set = b.build();
    let initial = set.initial_outputs();
    assert!(initial[0].is_none());
    assert_eq!(
        initial[1].as_deref().and_then(|v| v.downcast_ref::<f64>()),
        Some(&2.5)
    );
}
