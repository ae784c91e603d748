pub mod db;
pub mod identity;
pub mod memory;
pub mod notifier;

pub use db::DbAdapter;
pub use identity::{hash_password, PasswordIdentity};
pub use memory::MemoryStore;
pub use notifier::{HttpFunctionNotifier, LogNotifier};
