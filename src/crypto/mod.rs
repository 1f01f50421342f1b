pub mod encryption;

pub use encryption::{decrypt_chunk, encrypt_chunk, FileKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
