pub mod ping;
pub mod recent;
pub mod summary;
