pub(crate) mod mix;
pub(crate) mod wav;
