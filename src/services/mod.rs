pub mod executor;
pub mod persistence;
pub mod retry;
pub mod store;
pub mod worker;
