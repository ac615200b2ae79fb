//! External model service plumbing shared by the classifier and override clients

pub mod error;

pub use error::BackendError;
