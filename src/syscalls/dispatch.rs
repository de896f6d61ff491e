/*!
 * Request Dispatch
 *
 * Serves pager requests one at a time from an IPC endpoint. Recoverable
 * failures become negative reply statuses. An invariant violation is never
 * replied to: the loop logs it and stops.
 */

use super::executor::SyscallExecutor;
use super::types::PagerRequest;
use crate::core::errors::{Errno, InvariantViolation, PagerError};
use crate::core::types::TaskId;
use crate::ipc::IpcCall;
use crate::monitoring::RequestSpan;
use log::{debug, error, info, warn};
use std::sync::Arc;

impl SyscallExecutor {
    /// Run one request, producing its reply status
    pub fn dispatch(
        &self,
        sender: TaskId,
        request: PagerRequest,
    ) -> Result<i64, InvariantViolation> {
        let result = match request {
            PagerRequest::NotifyOpen {
                opener,
                fd,
                vnum,
                length,
            } => self.open_notify(sender, opener, fd, vnum, length).map(|_| 0),
            PagerRequest::Read { fd, buf, count } => {
                self.read(sender, fd, buf, count).map(|n| n as i64)
            }
            PagerRequest::Write { fd, buf, count } => {
                self.write(sender, fd, buf, count).map(|n| n as i64)
            }
            PagerRequest::Lseek { fd, offset, whence } => {
                self.lseek(sender, fd, offset, whence).map(i64::from)
            }
            PagerRequest::Close { fd } => self.close(sender, fd).map(|_| 0),
            PagerRequest::Fsync { fd } => self.fsync(sender, fd).map(|_| 0),
        };

        match result {
            Ok(status) => Ok(status),
            Err(PagerError::Invariant(violation)) => Err(violation),
            Err(e) => {
                debug!("Task {} {:?} failed: {}", sender, request.tag(), e);
                Ok(e.status().unwrap_or(Errno::EIO.as_status()))
            }
        }
    }
}

/// Single-request-at-a-time server loop around an executor
pub struct PagerServer {
    executor: Arc<SyscallExecutor>,
}

impl PagerServer {
    pub fn new(executor: Arc<SyscallExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<SyscallExecutor> {
        &self.executor
    }

    /// Serve until every sender is gone or an invariant is violated
    pub fn serve(&self, rx: flume::Receiver<IpcCall>) -> Result<(), InvariantViolation> {
        info!("Pager {} serving", self.executor.config().pager_tid);
        while let Ok(call) = rx.recv() {
            let message = call.message;
            let span = RequestSpan::new(message.tag, message.sender);
            let entered = span.span().clone();
            let _guard = entered.enter();

            let status = match PagerRequest::decode(message.tag, &message.mrs) {
                Ok(request) => match self.executor.dispatch(message.sender, request) {
                    Ok(status) => status,
                    Err(violation) => {
                        error!(
                            "Invariant violated serving {:?} from task {} (trace {}): {}",
                            message.tag,
                            message.sender,
                            span.trace_id(),
                            violation
                        );
                        return Err(violation);
                    }
                },
                Err(e) => {
                    warn!("Undecodable request from task {}: {}", message.sender, e);
                    e.status().unwrap_or(Errno::EINVAL.as_status())
                }
            };

            if !call.respond(status) {
                warn!("Task {} went away before the reply", message.sender);
            }
            span.finish(status);
        }
        info!("Pager {} stopped", self.executor.config().pager_tid);
        Ok(())
    }
}
