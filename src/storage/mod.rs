pub mod dictionary;
pub mod engine;

pub use dictionary::SeriesDictionary;
pub use engine::{StorageEngine, StorageError, StoreStats};
