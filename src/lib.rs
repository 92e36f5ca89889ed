pub mod config;
pub mod error;
pub mod storage;

pub mod prelude {
    pub use crate::config::StorageConfig;
    pub use crate::error::Result;
    pub use crate::storage::{
        Address, Data, FileStorage, Identifier, MemoryStorage, Storage, StatesGroup,
    };
}
