//! Factories for generating instances of hashvend modules.

pub mod core_fetch;
pub use core_fetch::CoreFetchFactory;

pub mod mem_content_store;
pub use mem_content_store::MemContentStore;

pub mod mem_channel;
pub use mem_channel::{Fault, MemChannel, MemNetwork};
