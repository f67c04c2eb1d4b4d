pub mod backend;
pub mod config;
pub mod credentials;
pub mod modem;
pub mod ports;
pub mod service;

pub use config::Config;
pub use credentials::{Credentials, CredentialsStore};
pub use modem::{Chip, Modem};
