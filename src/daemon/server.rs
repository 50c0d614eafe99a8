//! TCP server answering nyfikenc commands.

use crate::daemon::state::UpdateStore;
use crate::ipc::protocol::{encode_updates, is_overlong, Command, MAX_COMMAND_LINE};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, RwLock};
use tracing::{debug, info, warn};

/// Store shared between connections and the scheduler
pub type SharedStore = Arc<RwLock<UpdateStore>>;

/// How long a client may take to send its command line
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Daemon server owning the listening socket
pub struct DaemonServer {
    listener: TcpListener,
    store: SharedStore,
    recheck: Arc<Notify>,
    start_time: Instant,
}

impl DaemonServer {
    /// Bind the listening socket. `recheck` is notified on `recheck!`.
    pub async fn bind(addr: SocketAddr, store: SharedStore, recheck: Arc<Notify>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        Ok(Self {
            listener,
            store,
            recheck,
            start_time: Instant::now(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listening address")
    }

    /// Accept connections until `shutdown` is notified, then save the store.
    pub async fn run(self, shutdown: Arc<Notify>) -> Result<()> {
        info!("nyfikend listening on {}", self.local_addr()?);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!("accept failed: {}", e);
                            continue;
                        }
                    };
                    let store = self.store.clone();
                    let recheck = self.recheck.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, store, recheck).await {
                            warn!("connection from {} failed: {:#}", peer, e);
                        }
                    });
                }
                _ = shutdown.notified() => {
                    info!(
                        "shutdown requested after {}s, saving state",
                        self.start_time.elapsed().as_secs()
                    );
                    break;
                }
            }
        }

        let store = self.store.read().await;
        store.save().context("Failed to save update state on shutdown")?;
        Ok(())
    }
}

/// Handle a single client connection: one command, at most one reply.
async fn handle_connection(
    stream: TcpStream,
    store: SharedStore,
    recheck: Arc<Notify>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader.take(MAX_COMMAND_LINE as u64));
    let mut buf = Vec::new();

    let bytes_read = tokio::time::timeout(COMMAND_TIMEOUT, reader.read_until(b'\n', &mut buf))
        .await
        .context("Timed out waiting for command")??;
    if bytes_read == 0 {
        return Ok(()); // Connection closed
    }
    if is_overlong(&buf, MAX_COMMAND_LINE) {
        warn!("dropping connection: command line longer than {} bytes", MAX_COMMAND_LINE);
        return Ok(());
    }

    let line = String::from_utf8_lossy(&buf);
    let Some(command) = Command::from_line(&line) else {
        warn!("ignoring unknown command {:?}", line.trim_end());
        return Ok(());
    };
    debug!("received {:?}", command.literal());

    match command {
        Command::Updates => {
            // Encode under the read lock so the reply is one consistent snapshot.
            let reply = {
                let store = store.read().await;
                encode_updates(store.updates())?
            };
            writer.write_all(&reply).await?;
            writer.flush().await?;
            writer.shutdown().await?;
        }

        Command::ClearAll => {
            let mut store = store.write().await;
            let cleared = store.clear();
            info!("cleared {} pending updates", cleared);
            if let Err(e) = store.save() {
                warn!("clear not durably recorded: {}", e);
            }
        }

        Command::ForceRecheck => {
            info!("recheck of all pages requested");
            recheck.notify_one();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::updates::UpdateRecord;
    use crate::ipc::protocol::decode_updates;

    async fn start(store: UpdateStore) -> (SocketAddr, SharedStore, Arc<Notify>, Arc<Notify>) {
        let store = Arc::new(RwLock::new(store));
        let recheck = Arc::new(Notify::new());
        let shutdown = Arc::new(Notify::new());
        let server = DaemonServer::bind(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            store.clone(),
            recheck.clone(),
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run(shutdown.clone()));
        (addr, store, recheck, shutdown)
    }

    async fn exchange(addr: SocketAddr, line: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(line).await.unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();
        reply
    }

    /// Send `bytes` and collect whatever comes back before the daemon hangs
    /// up. A reset counts as hanging up.
    async fn send_and_wait_close(addr: SocketAddr, bytes: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut reply = Vec::new();
        tokio::time::timeout(Duration::from_secs(3), async {
            let _ = stream.write_all(bytes).await;
            let _ = stream.read_to_end(&mut reply).await;
        })
        .await
        .expect("daemon kept the connection open");
        reply
    }

    #[tokio::test]
    async fn test_query_returns_store_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = UpdateStore::new(tmp.path().join("updates.json"));
        store.merge(vec![UpdateRecord::new("http://a/"), UpdateRecord::new("http://b/")]);
        let (addr, _, _, _) = start(store).await;

        let reply = exchange(addr, b"updates?\n").await;
        let updates = decode_updates(&reply).unwrap();
        assert_eq!(updates.urls(), vec!["http://a/", "http://b/"]);
    }

    #[tokio::test]
    async fn test_clear_empties_and_saves() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("updates.json");
        let mut store = UpdateStore::new(&path);
        store.merge(vec![UpdateRecord::new("http://a/")]);
        store.save().unwrap();
        let (addr, shared, _, _) = start(store).await;

        assert!(exchange(addr, b"clear all!\n").await.is_empty());
        assert!(shared.read().await.updates().is_empty());
        assert!(UpdateStore::load(&path).unwrap().updates().is_empty());
    }

    #[tokio::test]
    async fn test_recheck_notifies_scheduler() {
        let tmp = tempfile::tempdir().unwrap();
        let (addr, _, recheck, _) = start(UpdateStore::new(tmp.path().join("u.json"))).await;

        assert!(exchange(addr, b"recheck!\n").await.is_empty());
        tokio::time::timeout(Duration::from_secs(5), recheck.notified())
            .await
            .expect("recheck was not signalled");
    }

    #[tokio::test]
    async fn test_unknown_command_gets_no_reply() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = UpdateStore::new(tmp.path().join("u.json"));
        store.merge(vec![UpdateRecord::new("http://a/")]);
        let (addr, shared, _, _) = start(store).await;

        assert!(exchange(addr, b"CLEAR ALL!\n").await.is_empty());
        assert_eq!(shared.read().await.updates().len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_command_line_is_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = UpdateStore::new(tmp.path().join("u.json"));
        store.merge(vec![UpdateRecord::new("http://a/")]);
        let (addr, shared, _, _) = start(store).await;

        // No newline: without a cap the daemon would wait for COMMAND_TIMEOUT.
        let reply = send_and_wait_close(addr, &vec![b'x'; 1024 * 1024]).await;
        assert!(reply.is_empty());
        assert_eq!(shared.read().await.updates().len(), 1);
    }

    #[tokio::test]
    async fn test_command_padded_past_limit_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = UpdateStore::new(tmp.path().join("u.json"));
        store.merge(vec![UpdateRecord::new("http://a/")]);
        let (addr, _, _, _) = start(store).await;

        let mut line = b"updates?".to_vec();
        line.resize(MAX_COMMAND_LINE + 16, b' ');
        line.push(b'\n');
        assert!(send_and_wait_close(addr, &line).await.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_saves_state() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("updates.json");
        let store = Arc::new(RwLock::new(UpdateStore::new(&path)));
        let shutdown = Arc::new(Notify::new());
        let server = DaemonServer::bind(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            store.clone(),
            Arc::new(Notify::new()),
        )
        .await
        .unwrap();
        store.write().await.merge(vec![UpdateRecord::new("http://a/")]);

        let task = tokio::spawn(server.run(shutdown.clone()));
        shutdown.notify_one();
        task.await.unwrap().unwrap();

        assert!(UpdateStore::load(&path).unwrap().updates().contains("http://a/"));
    }
}
