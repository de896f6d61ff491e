/*!
 * VM Pager - Main Entry Point
 *
 * Boots the pager next to an in-memory VFS server, runs a short client
 * session against it over IPC channels and reports resource usage.
 */

use std::error::Error;
use std::sync::Arc;
use tracing::{error, info, warn};

use vm_pager::core::limits::PAGE_SIZE;
use vm_pager::ipc::{ARG0, ARG1};
use vm_pager::{
    init_tracing, IpcRouter, IpcTag, IpcTransport, MemVfs, MessageRegisters, PagerConfig,
    PagerRequest, PagerServer, PhysicalMemory, SyscallExecutor, VmFlags, Whence,
};

const CLIENT_TID: u32 = 16;
const DEMO_VNUM: u64 = 0x2a;
const BUFFER: usize = 0x1000_0000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = PagerConfig::from_env();
    config.validate()?;
    init_tracing(config.trace_json);

    info!("VM pager starting...");
    info!(
        pager = config.pager_tid,
        vfs = config.vfs_tid,
        frames = config.physical_pages,
        "Configuration loaded"
    );

    let memory = Arc::new(PhysicalMemory::new(config.physical_pages));
    let router = IpcRouter::new();
    let pager_rx = router.register(config.pager_tid)?;
    let vfs_rx = router.register(config.vfs_tid)?;

    info!("Starting VFS server model...");
    let vfs = Arc::new(MemVfs::new(config.vfs_tid, Arc::clone(&memory)));
    vfs.create_file(DEMO_VNUM, b"pager demo file\n");
    vfs.link_pager(Arc::new(router.transport(config.vfs_tid)), config.pager_tid);

    info!("Starting pager server...");
    let executor = Arc::new(SyscallExecutor::new(
        config.clone(),
        Arc::clone(&memory),
        Arc::new(router.transport(config.pager_tid)),
    ));
    let client = executor.tasks().create(CLIENT_TID);
    client
        .lock()
        .space
        .map_region(&memory, BUFFER, 2 * PAGE_SIZE, VmFlags::READ_WRITE)?;

    let vfs_server = Arc::clone(&vfs);
    let vfs_handle = tokio::task::spawn_blocking(move || vfs_server.serve(vfs_rx));
    let server = PagerServer::new(Arc::clone(&executor));
    let pager_handle = tokio::task::spawn_blocking(move || server.serve(pager_rx));

    let session = {
        let transport = router.transport(CLIENT_TID);
        let executor = Arc::clone(&executor);
        let memory = Arc::clone(&memory);
        let pager_tid = config.pager_tid;
        let vfs_tid = config.vfs_tid;
        tokio::task::spawn_blocking(move || -> Result<(), String> {
            let fd = 3;
            let mut mrs = MessageRegisters::new();
            mrs.write_signed(ARG0, fd as i64).write(ARG1, DEMO_VNUM);
            let status = transport
                .send_recv(vfs_tid, IpcTag::VfsOpen, mrs)
                .map_err(|e| e.to_string())?;
            if status < 0 {
                return Err(format!("open failed with status {}", status));
            }

            let payload = b"appended by the client session\n";
            let task = executor
                .tasks()
                .find(CLIENT_TID)
                .ok_or("client task vanished")?;
            task.lock()
                .space
                .write_bytes(&memory, BUFFER, payload)
                .map_err(|e| e.to_string())?;

            let requests = [
                PagerRequest::Lseek {
                    fd,
                    offset: 0,
                    whence: Whence::End as i32,
                },
                PagerRequest::Write {
                    fd,
                    buf: BUFFER,
                    count: payload.len() as i32,
                },
                PagerRequest::Lseek {
                    fd,
                    offset: 0,
                    whence: Whence::Set as i32,
                },
                PagerRequest::Read {
                    fd,
                    buf: BUFFER + PAGE_SIZE,
                    count: PAGE_SIZE as i32,
                },
                PagerRequest::Close { fd },
            ];
            let mut read = 0;
            for request in requests {
                let status = request
                    .send(&transport, pager_tid)
                    .map_err(|e| e.to_string())?;
                info!(?request, status, "Client request served");
                if status < 0 {
                    return Err(format!("{:?} failed with status {}", request.tag(), status));
                }
                if let PagerRequest::Read { .. } = request {
                    read = status as usize;
                }
            }

            let contents = task
                .lock()
                .space
                .read_bytes(&memory, BUFFER + PAGE_SIZE, read)
                .map_err(|e| e.to_string())?;
            info!(
                "Client read back {} bytes: {:?}",
                read,
                String::from_utf8_lossy(&contents)
            );
            Ok(())
        })
    };

    tokio::select! {
        outcome = session => match outcome {
            Ok(Ok(())) => info!("Client session complete"),
            Ok(Err(e)) => error!(error = %e, "Client session failed"),
            Err(e) => error!(error = %e, "Client session panicked"),
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
        }
    }

    let exiting = Arc::clone(&executor);
    match tokio::task::spawn_blocking(move || exiting.exit_task(CLIENT_TID)).await {
        Ok(Ok(_)) => info!("Client task {} exited", CLIENT_TID),
        Ok(Err(e)) => warn!(error = %e, "Client task exit was not clean"),
        Err(e) => error!(error = %e, "Client task exit panicked"),
    }

    match serde_json::to_string(&executor.stats()) {
        Ok(stats) => info!(%stats, "Pager statistics"),
        Err(e) => warn!(error = %e, "Could not encode statistics"),
    }
    if let Some(contents) = vfs.contents(DEMO_VNUM) {
        info!(
            "Backing file now holds {} bytes: {:?}",
            contents.len(),
            String::from_utf8_lossy(&contents)
        );
    }

    router.unregister(config.pager_tid);
    router.unregister(config.vfs_tid);
    if let Ok(Err(violation)) = pager_handle.await {
        error!(%violation, "Pager stopped on an invariant violation");
    }
    let _ = vfs_handle.await;

    info!("VM pager stopped");
    Ok(())
}
