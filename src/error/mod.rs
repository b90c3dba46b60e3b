mod mirror;
mod request;

pub use mirror::MirrorError;
pub use request::CarefulRequestError;
