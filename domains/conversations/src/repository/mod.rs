mod memory;
mod threads;

pub use memory::InMemoryThreadStore;
pub use threads::{PgThreadStore, ThreadStore};
