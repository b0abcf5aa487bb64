pub mod config;
pub mod error;
pub mod paths;
pub mod portal;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use paths::Paths;
pub use portal::{ElementHandle, Locator, OptionChoice, PortalSession, SelectOption};
pub use types::{FailureEntry, FailureReason, Record, RecordKey, SemesterGroup, WorkList};
