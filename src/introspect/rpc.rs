//! Out-of-process introspection over a line-delimited JSON channel.
//!
//! Each request carries a numeric id. A reader thread owns the response side
//! of the channel and completes the matching entry in the pending map, so
//! responses may arrive in any order and any number of scanner workers can
//! wait on the same helper process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use super::{FaceInfo, FaceIntrospector};
use crate::error::IntrospectError;

const METHOD_FACES: &str = "faces";

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    id: u64,
    method: &'a str,
    path: &'a str,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: u64,
    #[serde(default)]
    faces: Option<Vec<FaceInfo>>,
    #[serde(default)]
    error: Option<String>,
}

type Reply = Result<Vec<FaceInfo>, IntrospectError>;
type PendingMap = Arc<Mutex<HashMap<u64, mpsc::Sender<Reply>>>>;

pub struct RpcIntrospector {
    writer: Mutex<Box<dyn Write + Send>>,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    timeout: Duration,
    child: Mutex<Option<Child>>,
    reader: Option<JoinHandle<()>>,
}

impl RpcIntrospector {
    /// Spawn the helper `command` and speak the protocol over its stdio.
    pub fn spawn(command: &[String], timeout: Duration) -> Result<Self, IntrospectError> {
        let (program, args) = command.split_first().ok_or_else(|| {
            IntrospectError::Remote("no introspection command configured".to_string())
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child.stdin.take().ok_or(IntrospectError::Closed)?;
        let stdout = child.stdout.take().ok_or(IntrospectError::Closed)?;

        let mut introspector = Self::from_streams(stdin, BufReader::new(stdout), timeout);
        introspector.child = Mutex::new(Some(child));
        debug!("Spawned introspection helper {}", program);
        Ok(introspector)
    }

    /// Build a client over an already-connected request/response pair.
    pub fn from_streams<W, R>(writer: W, reader: R, timeout: Duration) -> Self
    where
        W: Write + Send + 'static,
        R: BufRead + Send + 'static,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let reader = {
            let pending = Arc::clone(&pending);
            let closed = Arc::clone(&closed);
            thread::spawn(move || read_responses(reader, pending, closed))
        };

        Self {
            writer: Mutex::new(Box::new(writer)),
            pending,
            closed,
            next_id: AtomicU64::new(1),
            timeout,
            child: Mutex::new(None),
            reader: Some(reader),
        }
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        lock(&self.pending).len()
    }

    fn request(&self, path: &Path) -> Reply {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IntrospectError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let path_str = path.to_string_lossy();
        let mut line = serde_json::to_string(&RpcRequest {
            id,
            method: METHOD_FACES,
            path: &path_str,
        })
        .map_err(|e| IntrospectError::Remote(e.to_string()))?;
        line.push('\n');

        // Register before writing so a fast reply cannot miss its slot.
        let (tx, rx) = mpsc::channel();
        lock(&self.pending).insert(id, tx);
        if self.closed.load(Ordering::SeqCst) {
            lock(&self.pending).remove(&id);
            return Err(IntrospectError::Closed);
        }

        let written = {
            let mut writer = lock(&self.writer);
            writer
                .write_all(line.as_bytes())
                .and_then(|_| writer.flush())
        };
        if let Err(e) = written {
            lock(&self.pending).remove(&id);
            return Err(IntrospectError::Io(e));
        }

        match rx.recv_timeout(self.timeout) {
            Ok(reply) => reply,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                lock(&self.pending).remove(&id);
                Err(IntrospectError::Timeout(self.timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(IntrospectError::Closed),
        }
    }
}

impl FaceIntrospector for RpcIntrospector {
    fn describe(&self, path: &Path) -> Result<Vec<FaceInfo>, IntrospectError> {
        self.request(path)
    }
}

impl Drop for RpcIntrospector {
    fn drop(&mut self) {
        if let Some(mut child) = lock(&self.child).take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        // The reader thread exits once the response stream ends. With an
        // in-process stream that may never happen, so it is not joined.
        self.reader.take();
    }
}

fn read_responses<R: BufRead>(reader: R, pending: PendingMap, closed: Arc<AtomicBool>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Introspection channel read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response: RpcResponse = match serde_json::from_str(&line) {
            Ok(response) => response,
            Err(e) => {
                warn!("Discarding malformed introspection response: {}", e);
                continue;
            }
        };

        let reply = match (response.faces, response.error) {
            (_, Some(error)) => Err(IntrospectError::Remote(error)),
            (Some(faces), None) => Ok(faces),
            (None, None) => Err(IntrospectError::Remote("empty response".to_string())),
        };

        match lock(&pending).remove(&response.id) {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => debug!("No pending request for response id {}", response.id),
        }
    }

    closed.store(true, Ordering::SeqCst);
    for (_, tx) in lock(&pending).drain() {
        let _ = tx.send(Err(IntrospectError::Closed));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
