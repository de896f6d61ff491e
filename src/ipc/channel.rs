/*!
 * Channel Transport
 * Per-task IPC endpoints over flume channels
 */

use super::traits::IpcTransport;
use super::types::{IpcCall, IpcError, IpcResult, IpcTag, Message, MessageRegisters};
use crate::core::types::TaskId;
use ahash::RandomState;
use dashmap::DashMap;
use log::{debug, warn};
use std::sync::Arc;

/// Routes calls to the endpoint registered by each server task
#[derive(Clone, Default)]
pub struct IpcRouter {
    endpoints: Arc<DashMap<TaskId, flume::Sender<IpcCall>, RandomState>>,
}

impl IpcRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tid` as a server; its calls arrive on the returned receiver
    pub fn register(&self, tid: TaskId) -> IpcResult<flume::Receiver<IpcCall>> {
        use dashmap::mapref::entry::Entry;

        match self.endpoints.entry(tid) {
            Entry::Occupied(_) => Err(IpcError::EndpointExists(tid)),
            Entry::Vacant(slot) => {
                let (tx, rx) = flume::unbounded();
                slot.insert(tx);
                debug!("Registered IPC endpoint for task {}", tid);
                Ok(rx)
            }
        }
    }

    pub fn unregister(&self, tid: TaskId) {
        self.endpoints.remove(&tid);
    }

    /// Transport handle that sends as `tid`
    pub fn transport(&self, tid: TaskId) -> ChannelTransport {
        ChannelTransport {
            router: self.clone(),
            tid,
        }
    }
}

/// A task's view of the router; stamps itself as sender
#[derive(Clone)]
pub struct ChannelTransport {
    router: IpcRouter,
    tid: TaskId,
}

impl ChannelTransport {
    pub fn tid(&self) -> TaskId {
        self.tid
    }
}

impl IpcTransport for ChannelTransport {
    fn send_recv(&self, to: TaskId, tag: IpcTag, mrs: MessageRegisters) -> IpcResult<i64> {
        let endpoint = self
            .router
            .endpoints
            .get(&to)
            .map(|e| e.value().clone())
            .ok_or(IpcError::NoSuchTask(to))?;

        let (reply_tx, reply_rx) = flume::bounded(1);
        let call = IpcCall {
            message: Message {
                sender: self.tid,
                tag,
                mrs,
            },
            reply: reply_tx,
        };

        endpoint.send(call).map_err(|_| {
            warn!("Task {} endpoint closed before {:?}", to, tag);
            IpcError::Disconnected(format!("task {} endpoint closed", to))
        })?;

        reply_rx
            .recv()
            .map_err(|_| IpcError::Disconnected(format!("task {} dropped {:?} reply", to, tag)))
    }
}
