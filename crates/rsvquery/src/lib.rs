pub mod allocation;
pub mod assemble;
pub mod client;
pub mod common;
pub mod query;
pub mod reservation;

#[cfg(test)]
pub(crate) mod tests;

pub type Error = crate::common::error::RsvError;
pub type Result<T> = std::result::Result<T, Error>;

pub use reservation::{Node, Reservation};
