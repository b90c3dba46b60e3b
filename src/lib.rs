pub mod config;
pub mod error;
pub mod mirror;
pub mod platforms;
pub mod translate;
pub mod transport;
pub(crate) mod utils;

pub use error::{CarefulRequestError, MirrorError};
pub use mirror::{Credentials, Mirror, MirrorRecord, Pending, RunSummary};
pub use platforms::{INaturalistClient, MushroomObserverClient};
pub use transport::{CarefulClient, CarefulRequest, Payload, ServiceIdentity};
