/*!
 * IPC Module
 * Synchronous message passing between the pager, the VFS server and clients
 */

pub mod channel;
pub mod traits;
pub mod types;
pub mod vfs_client;

// Re-export for convenience
pub use channel::{ChannelTransport, IpcRouter};
pub use traits::IpcTransport;
pub use types::*;
pub use vfs_client::VfsClient;
