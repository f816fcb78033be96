use std::{any::Any, time::Duration};

use crate::{
    foundation::error::{OpflowError, OpflowResult},
    scene::renderable::{Renderable, TargetKind},
};

/// Per-context storage owned by one chain element (or one graph node).
///
/// Holds at most one value. Everything an operator or node must remember between
/// frames lives here rather than in its own fields.
#[derive(Default)]
pub struct StateSlot {
    value: Option<Box<dyn Any + Send>>,
}

impl StateSlot {
    /// Empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Whether the stored value is a `T`.
    pub fn holds<T: Any + Send>(&self) -> bool {
        self.value.as_ref().is_some_and(|v| v.is::<T>())
    }

    /// Borrow the value as `T`.
    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        self.value.as_ref()?.downcast_ref::<T>()
    }

    /// Mutably borrow the value as `T`.
    pub fn get_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.value.as_mut()?.downcast_mut::<T>()
    }

    /// Store `value`, dropping whatever was there.
    pub fn insert<T: Any + Send>(&mut self, value: T) {
        self.value = Some(Box::new(value));
    }

    /// Current `T`, creating it when the slot is empty or holds another type.
    pub fn get_or_insert_with<T: Any + Send>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> OpflowResult<&mut T> {
        if !self.holds::<T>() {
            self.value = Some(Box::new(init()));
        }
        self.value
            .as_mut()
            .and_then(|v| v.downcast_mut::<T>())
            .ok_or_else(|| OpflowError::evaluation("state slot lost its value"))
    }

    /// Remove and return the value if it is a `T`. Other types stay in place.
    pub fn take<T: Any + Send>(&mut self) -> Option<T> {
        if !self.holds::<T>() {
            return None;
        }
        self.value
            .take()
            .and_then(|v| v.downcast::<T>().ok())
            .map(|b| *b)
    }

    /// Drop the value. Returns `true` if there was one.
    pub fn clear(&mut self) -> bool {
        self.value.take().is_some()
    }
}

impl std::fmt::Debug for StateSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSlot")
            .field("occupied", &self.value.is_some())
            .finish()
    }
}

/// What an operator sees during one evaluation.
pub struct EvaluationContext<'a> {
    /// Evaluation time.
    pub time: Duration,
    /// Working list for this frame. Source operators append, configurators read.
    pub renderables: &'a mut Vec<Renderable>,
    /// Per-context storage of the operator.
    pub state: &'a mut StateSlot,
}

impl<'a> EvaluationContext<'a> {
    /// Context over `renderables` at `time`.
    pub fn new(
        time: Duration,
        renderables: &'a mut Vec<Renderable>,
        state: &'a mut StateSlot,
    ) -> Self {
        Self {
            time,
            renderables,
            state,
        }
    }

    /// Items of the working list that `target` selects.
    pub fn matching(&self, target: TargetKind) -> impl Iterator<Item = &Renderable> + '_ {
        self.renderables.iter().filter(move |r| target.matches(r))
    }
}
