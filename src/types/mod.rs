mod metadata;
mod chunk;
mod file;
mod folder;
mod provider;

pub use chunk::Locator;
pub use file::{detect_mime, Category, FALLBACK_MIME};
pub use folder::Folder;
pub use metadata::{EncryptionEnvelope, FileRecord};
pub use provider::Provider;
