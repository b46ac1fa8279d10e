pub mod work_queue;

pub use work_queue::{Dispatcher, PooledDispatcher, SpawnDispatcher, WorkQueue, global_worker_pool};
