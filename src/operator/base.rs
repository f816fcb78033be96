use std::sync::Arc;

use crate::{
    foundation::error::OpflowResult,
    foundation::ids::OperatorId,
    operator::context::{EvaluationContext, StateSlot},
    property::abstract_property::EditableProperty,
};

/// One element of an operator chain.
///
/// Lifecycle per context: `initialize_for_context`, any number of `evaluate` calls,
/// then `uninitialize_for_context`. `exit` runs once when the operator is removed for good.
/// Both teardown calls must tolerate being repeated.
pub trait Operator: Send + Sync {
    /// Stable name, also the `"type"` field of the operator's JSON.
    fn type_name(&self) -> &'static str;

    /// Identity used as the owner key of attachments.
    fn id(&self) -> OperatorId;

    /// Editable properties in display order.
    fn properties(&self) -> &[Arc<dyn EditableProperty>];

    /// Prepare `state` before the first evaluation in a context.
    fn initialize_for_context(&mut self, _state: &mut StateSlot) -> OpflowResult<()> {
        Ok(())
    }

    /// Run for one frame. An error skips this operator for the frame only.
    fn evaluate(&mut self, ctx: &mut EvaluationContext<'_>) -> OpflowResult<()>;

    /// Release everything held in `state`, detaching governed items.
    fn uninitialize_for_context(&mut self, state: &mut StateSlot);

    /// Final teardown when the operator leaves its chain.
    fn exit(&mut self) {}

    /// Serialize type and payload.
    fn write_json(&self) -> OpflowResult<serde_json::Value>;

    /// Restore payload from [`Operator::write_json`] output.
    fn read_json(&mut self, json: &serde_json::Value) -> OpflowResult<()>;
}

/// Check the `"type"` field of an operator document.
pub(crate) fn expect_type(json: &serde_json::Value, expected: &str) -> OpflowResult<()> {
    match json.get("type").and_then(serde_json::Value::as_str) {
        Some(ty) if ty == expected => Ok(()),
        Some(ty) => Err(crate::foundation::error::OpflowError::serde(format!(
            "expected operator '{expected}', found '{ty}'"
        ))),
        None => Err(crate::foundation::error::OpflowError::serde(
            "operator json is missing 'type'",
        )),
    }
}
