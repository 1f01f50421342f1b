pub mod error;
pub mod chunk;
pub mod config;
pub mod crypto;
pub mod relay;
pub mod session;
pub mod store;
pub mod transfer;

mod types;

pub use error::{AppError, RelayError, Result, StoreError, TransferError};
pub use session::{share_url, DriveSession, View};
pub use types::*;
