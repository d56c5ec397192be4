pub mod batch_store;

pub use batch_store::{all_completed, new_batch_id, BatchStore};
