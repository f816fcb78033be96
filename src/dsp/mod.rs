pub(crate) mod wsola;
