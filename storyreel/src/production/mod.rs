pub(crate) mod model;
pub(crate) mod orchestrator;
pub(crate) mod store;
