pub(crate) mod abstract_property;
pub(crate) mod cell;
pub(crate) mod core_property;
pub(crate) mod registry;
pub(crate) mod store;
