use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, Message, MethodId, Response};
use futures::{future::BoxFuture, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::metrics;
use crate::util::extract_ws_url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

/// Raw DevTools command channel.
#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn start(&self) -> Result<(), AdapterError>;
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError>;
}

type RuntimeFactory = Arc<
    dyn Fn(CdpConfig) -> BoxFuture<'static, Result<Arc<RuntimeState>, AdapterError>> + Send + Sync,
>;

/// Transport that launches (or connects to) Chromium and multiplexes commands over one socket.
#[derive(Clone)]
pub struct ChromiumTransport {
    cfg: CdpConfig,
    state: Arc<Mutex<Option<Arc<RuntimeState>>>>,
    factory: RuntimeFactory,
}

impl ChromiumTransport {
    pub fn new(cfg: CdpConfig) -> Self {
        let factory: RuntimeFactory = Arc::new(|cfg: CdpConfig| {
            Box::pin(async move { Ok(Arc::new(RuntimeState::start(cfg).await?)) })
        });
        Self {
            cfg,
            state: Arc::new(Mutex::new(None)),
            factory,
        }
    }

    #[cfg(test)]
    fn with_factory(cfg: CdpConfig, factory: RuntimeFactory) -> Self {
        Self {
            cfg,
            state: Arc::new(Mutex::new(None)),
            factory,
        }
    }

    async fn runtime(&self) -> Result<Arc<RuntimeState>, AdapterError> {
        let guard = self.state.lock().await;
        match guard.as_ref() {
            Some(rt) if rt.is_alive() => Ok(rt.clone()),
            Some(_) => Err(AdapterError::new(AdapterErrorKind::Disconnected)
                .with_hint("chromium connection is closed")),
            None => Err(AdapterError::new(AdapterErrorKind::Disconnected)
                .with_hint("transport not started")),
        }
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        let mut guard = self.state.lock().await;
        if guard.as_ref().map(|rt| rt.is_alive()).unwrap_or(false) {
            return Ok(());
        }
        let runtime = (self.factory)(self.cfg.clone()).await?;
        *guard = Some(runtime);
        Ok(())
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let runtime = self.runtime().await?;
        let started = Instant::now();
        let result = runtime
            .send_internal(
                target,
                method,
                params,
                Duration::from_millis(self.cfg.command_timeout_ms),
            )
            .await;
        metrics::record_command(method, started.elapsed(), result.is_ok());
        result
    }
}

struct ControlMessage {
    target: CommandTarget,
    method: String,
    params: Value,
    responder: oneshot::Sender<Result<Value, AdapterError>>,
}

struct RuntimeState {
    command_tx: mpsc::Sender<ControlMessage>,
    loop_task: JoinHandle<()>,
    child: std::sync::Mutex<Option<Child>>,
    alive: Arc<AtomicBool>,
}

impl RuntimeState {
    async fn start(cfg: CdpConfig) -> Result<Self, AdapterError> {
        let (child, ws_url) = match cfg.websocket_url.clone() {
            Some(url) => (None, url),
            None => Self::launch_browser(&cfg).await?,
        };

        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string()))?;

        let (command_tx, command_rx) = mpsc::channel(128);
        let alive = Arc::new(AtomicBool::new(true));
        let loop_alive = alive.clone();

        let loop_task = tokio::spawn(async move {
            let result = Self::run_loop(conn, command_rx).await;
            loop_alive.store(false, Ordering::Relaxed);
            if let Err(err) = result {
                error!(target: "cdp-transport", ?err, "transport loop terminated with error");
            }
        });

        info!(target: "cdp-transport", url = %ws_url, "chromium connection established");

        Ok(Self {
            command_tx,
            loop_task,
            child: std::sync::Mutex::new(child),
            alive,
        })
    }

    #[cfg(test)]
    fn test_stub() -> (Arc<Self>, Arc<AtomicBool>, mpsc::Receiver<ControlMessage>) {
        let (command_tx, command_rx) = mpsc::channel(8);
        let alive = Arc::new(AtomicBool::new(true));
        let loop_task = tokio::spawn(futures::future::pending::<()>());
        (
            Arc::new(Self {
                command_tx,
                loop_task,
                child: std::sync::Mutex::new(None),
                alive: alive.clone(),
            }),
            alive,
            command_rx,
        )
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    async fn send_internal(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, AdapterError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let message = ControlMessage {
            target,
            method: method.to_string(),
            params,
            responder: resp_tx,
        };

        self.command_tx.send(message).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::Disconnected).with_hint(err.to_string())
        })?;

        match tokio::time::timeout(deadline, resp_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AdapterError::new(AdapterErrorKind::Disconnected)
                .with_hint("command response channel closed")),
            Err(_) => Err(AdapterError::timeout(format!(
                "{method} timed out after {}ms",
                deadline.as_millis()
            ))),
        }
    }

    fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
        if !cfg.executable.as_os_str().is_empty() && !cfg.executable.exists() {
            return Err(AdapterError::new(AdapterErrorKind::InvalidArgument).with_hint(format!(
                "chrome executable not found at {}; set REFPILOT_CHROME",
                cfg.executable.display()
            )));
        }

        let profile_dir = if cfg.user_data_dir.is_absolute() {
            cfg.user_data_dir.clone()
        } else {
            std::env::current_dir()
                .map_err(|err| AdapterError::internal(format!("cannot resolve cwd: {err}")))?
                .join(&cfg.user_data_dir)
        };
        fs::create_dir_all(&profile_dir).map_err(|err| {
            AdapterError::internal(format!("failed to ensure user-data-dir: {err}"))
        })?;

        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_millis(cfg.command_timeout_ms))
            .launch_timeout(Duration::from_millis(cfg.launch_timeout_ms));
        if !cfg.headless {
            builder = builder.with_head();
        }
        if cfg.no_sandbox {
            builder = builder.no_sandbox();
        }

        let window = format!("--window-size={},{}", cfg.viewport_width, cfg.viewport_height);
        let mut args = vec![
            "--disable-background-networking",
            "--disable-background-timer-throttling",
            "--disable-breakpad",
            "--disable-component-update",
            "--disable-default-apps",
            "--disable-dev-shm-usage",
            "--disable-extensions",
            "--disable-popup-blocking",
            "--disable-sync",
            "--no-first-run",
            "--no-default-browser-check",
            "--password-store=basic",
            "--remote-allow-origins=*",
            "--use-mock-keychain",
            window.as_str(),
        ];
        if cfg.headless {
            args.push("--headless=new");
            args.push("--hide-scrollbars");
            args.push("--mute-audio");
        }
        builder = builder.args(args);

        if !cfg.executable.as_os_str().is_empty() {
            builder = builder.chrome_executable(cfg.executable.clone());
        }
        builder
            .user_data_dir(profile_dir)
            .build()
            .map_err(|err| AdapterError::internal(format!("browser config error: {err}")))
    }

    async fn launch_browser(cfg: &CdpConfig) -> Result<(Option<Child>, String), AdapterError> {
        let config = Self::browser_config(cfg)?;
        let mut child = config
            .launch()
            .map_err(|err| AdapterError::internal(format!("failed to launch chromium: {err}")))?;

        let ws_url = extract_ws_url(&mut child, Duration::from_millis(cfg.launch_timeout_ms))
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string()))?;

        Ok((Some(child), ws_url))
    }

    async fn run_loop(
        mut conn: Connection<CdpEventMessage>,
        mut command_rx: mpsc::Receiver<ControlMessage>,
    ) -> Result<(), AdapterError> {
        let mut inflight: HashMap<CallId, oneshot::Sender<Result<Value, AdapterError>>> =
            HashMap::new();

        loop {
            tokio::select! {
                Some(cmd) = command_rx.recv() => {
                    Self::submit(&mut conn, cmd, &mut inflight);
                }
                message = conn.next() => {
                    match message {
                        Some(Ok(Message::Response(resp))) => {
                            if let Some(sender) = inflight.remove(&resp.id) {
                                let _ = sender.send(Self::extract_payload(resp));
                            }
                        }
                        Some(Ok(Message::Event(_))) => {}
                        Some(Err(err)) => {
                            let adapter_err = Self::map_cdp_error(err);
                            for (_, sender) in inflight.drain() {
                                let _ = sender.send(Err(adapter_err.clone()));
                            }
                            return Err(adapter_err);
                        }
                        None => {
                            let err = AdapterError::new(AdapterErrorKind::Disconnected)
                                .with_hint("cdp connection closed");
                            for (_, sender) in inflight.drain() {
                                let _ = sender.send(Err(err.clone()));
                            }
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn submit(
        conn: &mut Connection<CdpEventMessage>,
        cmd: ControlMessage,
        inflight: &mut HashMap<CallId, oneshot::Sender<Result<Value, AdapterError>>>,
    ) {
        let session = match cmd.target {
            CommandTarget::Browser => None,
            CommandTarget::Session(id) => Some(CdpSessionId::from(id)),
        };
        let method_id: MethodId = cmd.method.clone().into();
        match conn.submit_command(method_id, session, cmd.params) {
            Ok(call_id) => {
                inflight.insert(call_id, cmd.responder);
            }
            Err(err) => {
                warn!(target: "cdp-transport", method = %cmd.method, %err, "submit failed");
                let _ = cmd.responder.send(Err(
                    AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string())
                ));
            }
        }
    }

    fn extract_payload(resp: Response) -> Result<Value, AdapterError> {
        if let Some(result) = resp.result {
            Ok(result)
        } else if let Some(error) = resp.error {
            Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("cdp error {}: {}", error.code, error.message))
                .retriable(error.code >= 500))
        } else {
            Err(AdapterError::internal("empty cdp response"))
        }
    }

    fn map_cdp_error(err: CdpError) -> AdapterError {
        let hint = err.to_string();
        match err {
            CdpError::Timeout => AdapterError::timeout(hint),
            CdpError::Ws(_) | CdpError::Io(_) | CdpError::NoResponse => {
                AdapterError::new(AdapterErrorKind::Disconnected).with_hint(hint)
            }
            _ => AdapterError::new(AdapterErrorKind::CdpIo).with_hint(hint),
        }
    }
}

impl Drop for RuntimeState {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        self.loop_task.abort();

        let child = self.child.lock().ok().and_then(|mut guard| guard.take());
        if let Some(mut child) = child {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(err) = child.kill().await {
                            warn!(target: "cdp-transport", ?err, "failed to kill chromium child");
                        }
                    });
                }
                Err(_) => {
                    debug!(target: "cdp-transport", "no runtime available to kill chromium child")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn stub_factory(
        spawned: Arc<AtomicUsize>,
        flags: Arc<std::sync::Mutex<Vec<Arc<AtomicBool>>>>,
        receivers: Arc<std::sync::Mutex<Vec<mpsc::Receiver<ControlMessage>>>>,
    ) -> RuntimeFactory {
        Arc::new(move |_cfg: CdpConfig| {
            let spawned = spawned.clone();
            let flags = flags.clone();
            let receivers = receivers.clone();
            Box::pin(async move {
                spawned.fetch_add(1, Ordering::SeqCst);
                let (runtime, alive, rx) = RuntimeState::test_stub();
                flags.lock().unwrap().push(alive);
                receivers.lock().unwrap().push(rx);
                Ok(runtime)
            })
        })
    }

    #[tokio::test]
    async fn start_is_idempotent_while_alive() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let flags = Arc::new(std::sync::Mutex::new(Vec::new()));
        let receivers = Arc::new(std::sync::Mutex::new(Vec::new()));
        let transport = ChromiumTransport::with_factory(
            CdpConfig::default(),
            stub_factory(spawned.clone(), flags.clone(), receivers),
        );

        transport.start().await.unwrap();
        transport.start().await.unwrap();
        assert_eq!(spawned.load(Ordering::SeqCst), 1);

        flags.lock().unwrap()[0].store(false, Ordering::SeqCst);
        let err = transport
            .send_command(CommandTarget::Browser, "Browser.getVersion", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Disconnected);

        transport.start().await.unwrap();
        assert_eq!(spawned.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn commands_before_start_report_disconnected() {
        let transport = ChromiumTransport::new(CdpConfig::default());
        let err = transport
            .send_command(CommandTarget::Browser, "Browser.getVersion", json!({}))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn unanswered_commands_time_out() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let flags = Arc::new(std::sync::Mutex::new(Vec::new()));
        let receivers = Arc::new(std::sync::Mutex::new(Vec::new()));
        let cfg = CdpConfig {
            command_timeout_ms: 20,
            ..CdpConfig::default()
        };
        let transport =
            ChromiumTransport::with_factory(cfg, stub_factory(spawned, flags, receivers.clone()));
        transport.start().await.unwrap();

        let err = transport
            .send_command(
                CommandTarget::Session("s1".into()),
                "Runtime.evaluate",
                json!({"expression": "1"}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Timeout);

        let mut rx = receivers.lock().unwrap().pop().unwrap();
        let queued = rx.try_recv().expect("command was queued");
        assert_eq!(queued.method, "Runtime.evaluate");
        assert_eq!(queued.target, CommandTarget::Session("s1".into()));
    }
}
