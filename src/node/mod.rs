pub(crate) mod base;
pub(crate) mod builtin;
pub(crate) mod graph;
pub(crate) mod socket;
