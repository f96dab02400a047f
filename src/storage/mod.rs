mod key_value;
mod settings_store;
pub mod validation;

pub use key_value::{FileStorage, InMemoryStorage, KeyValueStorage, StorageError};
pub use settings_store::{PersistedRecord, SettingsStore};
