pub(crate) mod base;
pub(crate) mod chain;
pub(crate) mod configurators;
pub(crate) mod configure;
pub(crate) mod context;
pub(crate) mod graph_op;
pub(crate) mod source;
