/*!
 * IPC Traits
 * Synchronous message transport abstraction
 */

use super::types::{IpcResult, IpcTag, MessageRegisters};
use crate::core::types::TaskId;

/// Blocking send-then-receive to a remote task
///
/// Returns the status the remote placed in its reply. A transport failure is
/// an `Err`; a negative status is the remote's own error.
pub trait IpcTransport: Send + Sync {
    fn send_recv(&self, to: TaskId, tag: IpcTag, mrs: MessageRegisters) -> IpcResult<i64>;
}

impl<T: IpcTransport + ?Sized> IpcTransport for std::sync::Arc<T> {
    fn send_recv(&self, to: TaskId, tag: IpcTag, mrs: MessageRegisters) -> IpcResult<i64> {
        (**self).send_recv(to, tag, mrs)
    }
}
