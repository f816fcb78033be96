use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        OpflowError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        OpflowError::animation("x")
            .to_string()
            .contains("animation error:")
    );
    assert!(
        OpflowError::evaluation("x")
            .to_string()
            .contains("evaluation error:")
    );
    assert!(OpflowError::graph("x").to_string().contains("graph error:"));
    assert!(
        OpflowError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn type_mismatch_names_both_types() {
    let err = OpflowError::type_mismatch("opacity", "f64", "alloc::string::String");
    let msg = err.to_string();
    assert!(msg.contains("opacity"));
    assert!(msg.contains("f64"));
    assert!(msg.contains("String"));
}

#[test]
fn json_errors_map_to_serde() {
    let err: OpflowError = serde_json::from_str::<f64>("nope").unwrap_err().into();
    assert!(matches!(err, OpflowError::Serde(_)));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = OpflowError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
