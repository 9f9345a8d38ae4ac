pub mod error;
pub mod events;
pub mod keys;
pub mod records;
