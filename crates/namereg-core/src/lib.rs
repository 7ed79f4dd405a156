pub mod command;
pub mod constants;
pub mod domain;
pub mod error;
pub mod name;
pub mod season;
pub mod types;

pub use command::*;
pub use constants::*;
pub use domain::*;
pub use error::{ErrorKind, RegistryError};
pub use name::*;
pub use season::*;
pub use types::*;
