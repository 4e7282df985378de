//! Blocking and event-driven ways of running client operations
//!
//! Both drive the same async transports; they differ only in who waits.
//! [`BlockingClient`] parks the calling thread until the operation is done,
//! [`EventLoop`] runs scheduled operations on a single-threaded reactor and
//! hands each outcome to a continuation.

use std::future::Future;

use serde_json::Value;
use tokio::runtime::{Builder, Runtime};
use tokio::task::{JoinHandle, LocalSet};
use tracing::debug;

use super::{Result, RpcProtocol, RpcTransport, TorrentClient, TorrentRef, TorrentSource};
use crate::model::{Torrent, TorrentInfo};

/// Synchronous facade over any [`TorrentClient`]
///
/// Must not be used from inside an async runtime.
pub struct BlockingClient<C> {
    inner: C,
    runtime: Runtime,
}

impl<C: TorrentClient> BlockingClient<C> {
    pub fn new(inner: C) -> std::io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { inner, runtime })
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn test_connection(&self) -> Result<bool> {
        self.runtime.block_on(self.inner.test_connection())
    }

    pub fn add_torrent(&self, source: TorrentSource) -> Result<Torrent> {
        self.runtime.block_on(self.inner.add_torrent(source))
    }

    pub fn get_torrent(&self, id: &str) -> Result<Torrent> {
        self.runtime.block_on(self.inner.get_torrent(id))
    }

    pub fn get_torrents(&self, ids: &[String]) -> Result<Vec<Torrent>> {
        self.runtime.block_on(self.inner.get_torrents(ids))
    }

    pub fn start_torrent(&self, target: TorrentRef<'_>) -> Result<Torrent> {
        self.runtime.block_on(self.inner.start_torrent(target))
    }

    pub fn pause_torrent(&self, target: TorrentRef<'_>) -> Result<Torrent> {
        self.runtime.block_on(self.inner.pause_torrent(target))
    }

    pub fn delete_torrent(&self, target: TorrentRef<'_>) -> Result<Value> {
        self.runtime.block_on(self.inner.delete_torrent(target))
    }

    pub fn get_torrent_info(&self, source: TorrentSource) -> Result<TorrentInfo> {
        self.runtime.block_on(self.inner.get_torrent_info(source))
    }
}

/// Single-threaded reactor with continuation-passing completion
///
/// Each scheduled operation owns its continuation and calls it exactly once,
/// on success or failure. [`run`](Self::run) returns once every scheduled
/// operation has delivered its outcome; a panic in an operation or its
/// continuation is resumed on the caller of `run`.
pub struct EventLoop {
    runtime: Runtime,
    tasks: LocalSet,
    handles: Vec<JoinHandle<()>>,
}

impl EventLoop {
    pub fn new() -> std::io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime,
            tasks: LocalSet::new(),
            handles: Vec::new(),
        })
    }

    /// Queue `operation`; `continuation` receives its outcome during [`run`](Self::run)
    pub fn schedule<F, T, K>(&mut self, operation: F, continuation: K)
    where
        F: Future<Output = Result<T>> + 'static,
        T: 'static,
        K: FnOnce(Result<T>) + 'static,
    {
        let handle = self.tasks.spawn_local(async move {
            let outcome = operation.await;
            continuation(outcome);
        });
        self.handles.push(handle);
    }

    /// Drive the loop until every scheduled operation has completed
    pub fn run(&mut self) {
        let tasks = std::mem::take(&mut self.tasks);
        let handles = std::mem::take(&mut self.handles);
        debug!("Running event loop with {} operations", handles.len());

        let joined = self.runtime.block_on(tasks.run_until(async move {
            let mut joined = Vec::with_capacity(handles.len());
            for handle in handles {
                joined.push(handle.await);
            }
            joined
        }));

        for result in joined {
            if let Err(e) = result {
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
            }
        }
    }

    /// Schedule one operation and run it to completion
    pub fn submit<F, T, K>(&mut self, operation: F, continuation: K)
    where
        F: Future<Output = Result<T>> + 'static,
        T: 'static,
        K: FnOnce(Result<T>) + 'static,
    {
        self.schedule(operation, continuation);
        self.run();
    }

    /// Run one RPC method and pass the raw response body to `continuation`
    pub fn submit_raw<P, K>(
        &mut self,
        transport: std::sync::Arc<RpcTransport<P>>,
        method: &str,
        params: Value,
        continuation: K,
    ) where
        P: RpcProtocol,
        K: FnOnce(Result<String>) + 'static,
    {
        let method = method.to_string();
        self.submit(
            async move { transport.perform_raw(&method, params).await },
            continuation,
        );
    }

    /// Number of operations waiting for [`run`](Self::run)
    pub fn pending(&self) -> usize {
        self.handles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testutil::{connection, response, response_with_header, ScriptedHttp};
    use crate::client::{
        ClientError, DelugeClient, DelugeProtocol, TransmissionProtocol, TransportError,
    };
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    const COOKIE: &str = "_session_id=abc; Path=/json";

    fn deluge(http: &Arc<ScriptedHttp>) -> DelugeClient {
        DelugeClient::new("home", RpcTransport::new(connection(), http.clone(), DelugeProtocol))
    }

    #[test]
    fn test_blocking_client_lists_torrents() {
        let http = ScriptedHttp::new();
        http.push(response_with_header(200, r#"{"result": true, "error": null}"#, "set-cookie", COOKIE));
        http.push(response(
            200,
            &json!({"result": {"h": {"hash": "h", "name": "n", "total_wanted": 1, "files": []}}, "error": null})
                .to_string(),
        ));

        let client = BlockingClient::new(deluge(&http)).unwrap();
        let torrents = client.get_torrents(&[]).unwrap();

        assert_eq!(torrents.len(), 1);
        assert_eq!(client.inner().name(), "home");
    }

    #[test]
    fn test_blocking_client_rejects_missing_target() {
        let http = ScriptedHttp::new();
        let client = BlockingClient::new(deluge(&http)).unwrap();

        let err = client.start_torrent(TorrentRef::default()).unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument { .. }));
        assert_eq!(http.calls(), 0);
    }

    #[test]
    fn test_event_loop_calls_continuation_once_on_success() {
        let http = ScriptedHttp::new();
        http.push(response_with_header(200, "", "x-transmission-session-id", "tok"));
        http.push(response(200, r#"{"result": "success", "arguments": {"torrents": []}}"#));

        let transport = Arc::new(RpcTransport::new(connection(), http.clone(), TransmissionProtocol));
        let seen: Rc<RefCell<Vec<Result<String>>>> = Rc::default();
        let sink = seen.clone();

        let mut event_loop = EventLoop::new().unwrap();
        event_loop.submit(
            async move { transport.get_torrents_raw(&[]).await },
            move |outcome| sink.borrow_mut().push(outcome),
        );

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        let body = seen[0].as_ref().unwrap();
        assert!(body.contains("torrents"));
        assert_eq!(event_loop.pending(), 0);
    }

    #[test]
    fn test_event_loop_calls_continuation_once_on_error() {
        let http = ScriptedHttp::new();
        http.push(response(401, "Unauthorized"));

        let transport = Arc::new(RpcTransport::new(connection(), http.clone(), TransmissionProtocol));
        let seen: Rc<RefCell<Vec<Result<String>>>> = Rc::default();
        let sink = seen.clone();

        let mut event_loop = EventLoop::new().unwrap();
        event_loop.submit_raw(transport, "torrent-get", json!({}), move |outcome| {
            sink.borrow_mut().push(outcome)
        });

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert!(matches!(
            seen[0],
            Err(ClientError::Transport {
                source: TransportError::AuthenticationFailed(_),
                ..
            })
        ));
        assert_eq!(http.calls(), 1);
    }

    #[test]
    fn test_event_loop_panic_in_continuation_reaches_caller() {
        let mut event_loop = EventLoop::new().unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            event_loop.submit(async { Ok::<u8, ClientError>(1) }, |_| {
                panic!("continuation failed")
            });
        }));

        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"continuation failed"));
        assert_eq!(event_loop.pending(), 0);
    }

    #[test]
    fn test_event_loop_panic_in_operation_reaches_caller() {
        let mut event_loop = EventLoop::new().unwrap();
        let called = Rc::new(RefCell::new(false));
        let flag = called.clone();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            event_loop.submit(
                async {
                    if true {
                        panic!("operation failed");
                    }
                    Ok::<u8, ClientError>(1)
                },
                move |_| *flag.borrow_mut() = true,
            );
        }));

        assert!(result.is_err());
        assert!(!*called.borrow());
    }

    #[test]
    fn test_event_loop_runs_all_scheduled_operations() {
        let http = ScriptedHttp::new();
        for _ in 0..2 {
            http.push(response_with_header(200, r#"{"result": true, "error": null}"#, "set-cookie", COOKIE));
            http.push(response(200, r#"{"result": ["a"], "error": null}"#));
        }

        let client = Rc::new(deluge(&http));
        let results = Rc::new(RefCell::new(Vec::new()));
        let mut event_loop = EventLoop::new().unwrap();

        for _ in 0..2 {
            let client = client.clone();
            let results = results.clone();
            event_loop.schedule(async move { client.session_state().await }, move |outcome| {
                results.borrow_mut().push(outcome.unwrap())
            });
        }
        assert_eq!(event_loop.pending(), 2);
        event_loop.run();

        assert_eq!(results.borrow().len(), 2);
        assert_eq!(http.calls(), 4);
    }
}
