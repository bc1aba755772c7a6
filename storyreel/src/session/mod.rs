pub(crate) mod capture;
pub(crate) mod cursor;
pub(crate) mod preview;
pub(crate) mod stage;
pub(crate) mod timeline;
