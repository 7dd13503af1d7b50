//! Control Service - hosts one listener per handler and drives their lifecycle.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{NodeError, NodeResult};
use crate::server::BindTarget;

/// Lifecycle of a [`ControlService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// Lifecycle of a single listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Socket bound, nothing accepted yet.
    Bound,
    /// Accepting connections on a serving task.
    Serving,
    /// Socket closed.
    Closed,
}

/// A named router to be hosted on its own port.
#[derive(Debug)]
pub struct Handler {
    name: String,
    router: Router,
}

impl Handler {
    pub fn new(name: impl Into<String>, router: Router) -> Self {
        Self {
            name: name.into(),
            router,
        }
    }
}

/// One (handler, port) pair and the listener serving it.
#[derive(Debug)]
pub struct Binding {
    name: String,
    local_addr: SocketAddr,
    state: ListenerState,
    pending: Option<(TcpListener, Router)>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl Binding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    fn serve(&mut self, mut shutdown: watch::Receiver<bool>) {
        let Some((listener, router)) = self.pending.take() else {
            return;
        };

        self.task = Some(tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    // Only ever flips to true; a dropped sender also means stop.
                    let _ = shutdown.changed().await;
                })
                .await
        }));
        self.state = ListenerState::Serving;

        tracing::info!(name = %self.name, address = %self.local_addr, "Listener serving");
    }

    async fn close(&mut self, grace: Duration) {
        if self.state == ListenerState::Closed {
            return;
        }

        self.pending = None;

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(grace, &mut task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => {
                    tracing::warn!(name = %self.name, error = %e, "Listener stopped with error");
                }
                Ok(Err(e)) => {
                    tracing::warn!(name = %self.name, error = %e, "Listener task failed");
                }
                Err(_) => {
                    tracing::warn!(
                        name = %self.name,
                        grace_secs = grace.as_secs(),
                        "Listener did not drain in time, aborting"
                    );
                    task.abort();
                    let _ = task.await;
                }
            }
        }

        self.state = ListenerState::Closed;
        tracing::info!(name = %self.name, address = %self.local_addr, "Listener closed");
    }
}

/// Owns the listener set of the node.
#[derive(Debug)]
pub struct ControlService {
    bindings: Vec<Binding>,
    state: ServiceState,
    shutdown: watch::Sender<bool>,
    grace: Duration,
}

impl ControlService {
    /// Default time each listener gets to drain on shutdown.
    pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

    /// Bind one listener per (handler, port) pair on the resolved address.
    ///
    /// Fails before binding anything when the counts differ or the address
    /// cannot be resolved. A bind failure closes the listeners bound so far.
    pub async fn new(
        handlers: Vec<Handler>,
        ports: Vec<u16>,
        target: &BindTarget,
    ) -> NodeResult<Self> {
        if handlers.len() != ports.len() {
            return Err(NodeError::Config(format!(
                "must specify one port per handler ({} handlers, {} ports)",
                handlers.len(),
                ports.len()
            )));
        }

        let addr = target.resolve()?;

        let mut bindings = Vec::with_capacity(handlers.len());
        for (handler, port) in handlers.into_iter().zip(ports) {
            let listener = TcpListener::bind((addr, port))
                .await
                .map_err(|source| NodeError::Bind { port, source })?;
            let local_addr = listener.local_addr()?;

            tracing::debug!(name = %handler.name, address = %local_addr, "Listener bound");

            bindings.push(Binding {
                name: handler.name,
                local_addr,
                state: ListenerState::Bound,
                pending: Some((listener, handler.router)),
                task: None,
            });
        }

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            bindings,
            state: ServiceState::Created,
            shutdown,
            grace: Self::DEFAULT_SHUTDOWN_TIMEOUT,
        })
    }

    /// Set how long each listener may drain on shutdown.
    pub fn with_shutdown_timeout(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Address of the listener registered under `name`.
    pub fn local_addr(&self, name: &str) -> Option<SocketAddr> {
        self.bindings
            .iter()
            .find(|b| b.name == name)
            .map(Binding::local_addr)
    }

    /// Start serving every listener on background tasks.
    ///
    /// Single shot: only valid from [`ServiceState::Created`].
    pub fn start(&mut self) -> NodeResult<()> {
        if self.state != ServiceState::Created {
            return Err(NodeError::Lifecycle(format!(
                "cannot start service in state {:?}",
                self.state
            )));
        }

        tracing::info!(listeners = self.bindings.len(), "Starting all services");

        for binding in &mut self.bindings {
            binding.serve(self.shutdown.subscribe());
        }
        self.state = ServiceState::Running;

        Ok(())
    }

    /// Close every listener and stop serving.
    ///
    /// Safe to call before [`start`](Self::start) and more than once.
    pub async fn shutdown(&mut self) {
        match self.state {
            ServiceState::Stopping | ServiceState::Stopped => {
                tracing::debug!(state = ?self.state, "Shutdown already done");
                return;
            }
            ServiceState::Created | ServiceState::Running => {}
        }

        self.state = ServiceState::Stopping;
        tracing::info!("Shutting down listeners");

        self.shutdown.send_replace(true);
        for binding in &mut self.bindings {
            binding.close(self.grace).await;
        }

        self.state = ServiceState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use axum::routing::get;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn localhost() -> BindTarget {
        BindTarget::Address(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn handlers() -> Vec<Handler> {
        vec![
            Handler::new("content", Router::new().route("/", get(|| async { "content" }))),
            Handler::new("control", Router::new().route("/", get(|| async { "control" }))),
        ]
    }

    async fn http_get(addr: SocketAddr) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_port_count_mismatch_fails() {
        let result = ControlService::new(handlers(), vec![0], &localhost()).await;
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[tokio::test]
    async fn test_mismatch_checked_before_address() {
        let target = BindTarget::Interface("nosuchif0".to_string());
        let result = ControlService::new(handlers(), vec![0], &target).await;
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[tokio::test]
    async fn test_unresolvable_interface_fails() {
        let target = BindTarget::Interface("nosuchif0".to_string());
        let result = ControlService::new(handlers(), vec![0, 0], &target).await;
        assert!(matches!(result, Err(NodeError::AddressResolution(_))));
    }

    #[tokio::test]
    async fn test_port_in_use_fails() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let result = ControlService::new(handlers(), vec![0, port], &localhost()).await;
        assert!(matches!(result, Err(NodeError::Bind { port: p, .. }) if p == port));
    }

    #[tokio::test]
    async fn test_serves_each_handler_on_its_port() {
        let mut service = ControlService::new(handlers(), vec![0, 0], &localhost())
            .await
            .unwrap();
        assert_eq!(service.state(), ServiceState::Created);
        assert!(service
            .bindings()
            .iter()
            .all(|b| b.state() == ListenerState::Bound));

        assert_ok!(service.start());
        assert_eq!(service.state(), ServiceState::Running);

        let content = http_get(service.local_addr("content").unwrap()).await;
        let control = http_get(service.local_addr("control").unwrap()).await;
        assert!(content.starts_with("HTTP/1.1 200"));
        assert!(content.ends_with("content"));
        assert!(control.ends_with("control"));

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_is_single_shot() {
        let mut service = ControlService::new(handlers(), vec![0, 0], &localhost())
            .await
            .unwrap();
        assert_ok!(service.start());
        assert_err!(service.start());

        service.shutdown().await;
        assert!(matches!(service.start(), Err(NodeError::Lifecycle(_))));
    }

    #[tokio::test]
    async fn test_shutdown_twice_closes_listeners() {
        let mut service = ControlService::new(handlers(), vec![0, 0], &localhost())
            .await
            .unwrap()
            .with_shutdown_timeout(Duration::from_secs(1));
        service.start().unwrap();
        let addrs: Vec<_> = service.bindings().iter().map(Binding::local_addr).collect();

        service.shutdown().await;
        service.shutdown().await;

        assert_eq!(service.state(), ServiceState::Stopped);
        assert!(service
            .bindings()
            .iter()
            .all(|b| b.state() == ListenerState::Closed));
        for addr in addrs {
            assert!(TcpStream::connect(addr).await.is_err());
        }
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let mut service = ControlService::new(handlers(), vec![0, 0], &localhost())
            .await
            .unwrap();
        let addr = service.local_addr("control").unwrap();

        service.shutdown().await;

        assert_eq!(service.state(), ServiceState::Stopped);
        assert!(service
            .bindings()
            .iter()
            .all(|b| b.state() == ListenerState::Closed));
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
