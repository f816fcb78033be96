use std::{
    any::{Any, TypeId},
    fmt,
    marker::PhantomData,
    sync::Arc,
};

use smallvec::SmallVec;

use crate::foundation::error::{OpflowError, OpflowResult};

/// Values that can flow through sockets.
pub trait SocketType: Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> SocketType for T where T: Clone + fmt::Debug + Send + Sync + 'static {}

/// Type-erased socket value.
pub trait SocketValue: fmt::Debug + Send + Sync {
    /// Boxed copy of the value.
    fn clone_value(&self) -> Box<dyn SocketValue>;
    /// View for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// `TypeId` of the concrete value.
    fn value_type(&self) -> TypeId;
    /// Concrete type name, for diagnostics.
    fn type_name(&self) -> &'static str;
}

impl<T: SocketType> SocketValue for T {
    fn clone_value(&self) -> Box<dyn SocketValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl dyn SocketValue {
    /// Borrow as `T` if that is the concrete type.
    pub fn downcast_ref<T: SocketType>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Whether the concrete type is `T`.
    pub fn is<T: SocketType>(&self) -> bool {
        self.value_type() == TypeId::of::<T>()
    }
}

pub(crate) type ConvertFn = Arc<dyn Fn(&dyn Any) -> Option<Box<dyn SocketValue>> + Send + Sync>;

/// Conversion an input socket accepts from an upstream output of another type.
#[derive(Clone)]
pub(crate) struct Receiver {
    pub(crate) source: TypeId,
    pub(crate) source_name: &'static str,
    pub(crate) convert: ConvertFn,
}

pub(crate) struct InputDecl {
    pub(crate) name: &'static str,
    pub(crate) value_type: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) default: Box<dyn SocketValue>,
    pub(crate) receivers: SmallVec<[Receiver; 2]>,
}

pub(crate) struct OutputDecl {
    pub(crate) name: &'static str,
    pub(crate) value_type: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) initial: Option<Box<dyn SocketValue>>,
}

/// Typed handle to a node's input socket.
pub struct InputSocket<T> {
    index: usize,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

/// Typed handle to a node's output socket.
pub struct OutputSocket<T> {
    index: usize,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

macro_rules! socket_handle {
    ($ty:ident) => {
        impl<T> $ty<T> {
            /// Position in the node's socket list.
            pub fn index(&self) -> usize {
                self.index
            }

            /// Declared socket name.
            pub fn name(&self) -> &'static str {
                self.name
            }
        }

        impl<T> Clone for $ty<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $ty<T> {}

        impl<T> fmt::Debug for $ty<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}#{})", stringify!($ty), self.name, self.index)
            }
        }
    };
}

socket_handle!(InputSocket);
socket_handle!(OutputSocket);

/// Numeric types that input sockets can convert between with `accept_numbers`.
pub trait SocketNumber: SocketType + Copy {
    /// Widen to `f64`.
    fn to_f64(self) -> f64;
    /// Narrow from `f64` with `as` semantics.
    fn from_f64(v: f64) -> Self;
}

macro_rules! socket_number {
    ($($t:ty),*) => {$(
        impl SocketNumber for $t {
            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(v: f64) -> Self {
                v as $t
            }
        }
    )*};
}

socket_number!(f32, f64, i32, i64, u32, u64);

/// Fixed socket layout of one node, declared at construction.
pub struct SocketSet {
    pub(crate) inputs: Vec<InputDecl>,
    pub(crate) outputs: Vec<OutputDecl>,
}

impl SocketSet {
    /// Start declaring a layout.
    pub fn builder() -> SocketBuilder {
        SocketBuilder::default()
    }

    /// Input names in declaration order.
    pub fn input_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.inputs.iter().map(|i| i.name)
    }

    /// Output names in declaration order.
    pub fn output_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.outputs.iter().map(|o| o.name)
    }

    /// Position of the input called `name`.
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|i| i.name == name)
    }

    /// Position of the output called `name`.
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|o| o.name == name)
    }

    /// Number of inputs.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of outputs.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub(crate) fn input(&self, index: usize) -> OpflowResult<&InputDecl> {
        self.inputs
            .get(index)
            .ok_or_else(|| OpflowError::graph(format!("no input socket #{index}")))
    }

    pub(crate) fn output(&self, index: usize) -> OpflowResult<&OutputDecl> {
        self.outputs
            .get(index)
            .ok_or_else(|| OpflowError::graph(format!("no output socket #{index}")))
    }

    pub(crate) fn initial_outputs(&self) -> Vec<Option<Box<dyn SocketValue>>> {
        self.outputs
            .iter()
            .map(|o| o.initial.as_deref().map(SocketValue::clone_value))
            .collect()
    }
}

impl fmt::Debug for SocketSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketSet")
            .field("inputs", &self.input_names().collect::<Vec<_>>())
            .field("outputs", &self.output_names().collect::<Vec<_>>())
            .finish()
    }
}

/// Collects socket declarations for [`SocketSet`].
#[derive(Default)]
pub struct SocketBuilder {
    inputs: Vec<InputDecl>,
    outputs: Vec<OutputDecl>,
}

impl SocketBuilder {
    /// Declare an input that falls back to `default` while unconnected.
    pub fn input<T: SocketType>(&mut self, name: &'static str, default: T) -> InputBuilder<'_, T> {
        InputBuilder {
            builder: self,
            name,
            default,
            receivers: SmallVec::new(),
        }
    }

    /// Declare an output that is empty until the node writes it.
    pub fn output<T: SocketType>(&mut self, name: &'static str) -> OutputSocket<T> {
        self.push_output(name, None)
    }

    /// Declare an output that reads `initial` until the node first writes it.
    pub fn output_with<T: SocketType>(&mut self, name: &'static str, initial: T) -> OutputSocket<T> {
        self.push_output(name, Some(Box::new(initial)))
    }

    fn push_output<T: SocketType>(
        &mut self,
        name: &'static str,
        initial: Option<Box<dyn SocketValue>>,
    ) -> OutputSocket<T> {
        let index = self.outputs.len();
        self.outputs.push(OutputDecl {
            name,
            value_type: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            initial,
        });
        OutputSocket {
            index,
            name,
            _marker: PhantomData,
        }
    }

    /// Freeze the layout.
    pub fn build(self) -> SocketSet {
        SocketSet {
            inputs: self.inputs,
            outputs: self.outputs,
        }
    }
}

/// Pending input declaration. Call [`InputBuilder::finish`] to get the handle.
pub struct InputBuilder<'a, T> {
    builder: &'a mut SocketBuilder,
    name: &'static str,
    default: T,
    receivers: SmallVec<[Receiver; 2]>,
}

impl<T: SocketType> InputBuilder<'_, T> {
    /// Accept upstream values of type `U`, converted with `convert`.
    pub fn accept<U: SocketType>(mut self, convert: fn(&U) -> T) -> Self {
        if TypeId::of::<U>() == TypeId::of::<T>() {
            return self;
        }
        self.receivers.retain(|r| r.source != TypeId::of::<U>());
        self.receivers.push(Receiver {
            source: TypeId::of::<U>(),
            source_name: std::any::type_name::<U>(),
            convert: Arc::new(move |v: &dyn Any| {
                v.downcast_ref::<U>()
                    .map(|u| Box::new(convert(u)) as Box<dyn SocketValue>)
            }),
        });
        self
    }

    /// Record the input and return its handle.
    pub fn finish(self) -> InputSocket<T> {
        let index = self.builder.inputs.len();
        self.builder.inputs.push(InputDecl {
            name: self.name,
            value_type: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            default: Box::new(self.default),
            receivers: self.receivers,
        });
        InputSocket {
            index,
            name: self.name,
            _marker: PhantomData,
        }
    }
}

impl<T: SocketNumber> InputBuilder<'_, T> {
    /// Accept every other [`SocketNumber`] type, converting through `f64`.
    pub fn accept_numbers(self) -> Self {
        fn conv<U: SocketNumber, T: SocketNumber>(u: &U) -> T {
            T::from_f64(u.to_f64())
        }
        self.accept::<f32>(conv::<f32, T>)
            .accept::<f64>(conv::<f64, T>)
            .accept::<i32>(conv::<i32, T>)
            .accept::<i64>(conv::<i64, T>)
            .accept::<u32>(conv::<u32, T>)
            .accept::<u64>(conv::<u64, T>)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/node/socket.rs"]
mod tests;
