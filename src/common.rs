pub mod error;
pub mod signature;
