pub mod storage;
pub mod webhdfs;

pub use storage::{LocalStorage, Storage, StorageError, storage_from_config};
pub use webhdfs::WebHdfsStorage;
