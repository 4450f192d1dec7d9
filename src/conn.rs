//! The connection control loop.
//!
//! One connection owns the socket, the registration handshake, the
//! event registry, the scheduler, the plugin registry and the send
//! queue, and drives them from a single task. Each pass through
//! [`Connection::tick`] does a bounded amount of work:
//!
//! 1. read inbound lines (bounded wait, then whatever is buffered),
//!    feeding the handshake and dispatching events;
//! 2. apply deferred handler requests;
//! 3. write at most one queued line;
//! 4. accept at most one line from the worker pipe;
//! 5. fire due scheduler jobs.
//!
//! Writing one line per tick is the flood protection: no handler or
//! worker burst can exceed one line per tick on the wire. Keepalive
//! replies bypass the backlog by entering at the queue front.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::{Duration, Instant};

use corvid_proto::{
    Command, HandshakeAction, HandshakeConfig, HandshakeMachine, IrcCodec, Message, ProtocolError,
};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::error::ConnectError;
use crate::event::{Context, Control, EventRegistry};
use crate::events::{self, names};
use crate::plugin::{PluginContext, PluginRegistry};
use crate::scheduler::Scheduler;
use crate::state::{ChannelTable, UserTable};
use crate::worker::{worker_pipe, WorkerPipe};

/// Upper bound on messages handled in one tick's drain, so one tick
/// cannot monopolize the loop during a server flood.
const MAX_DRAIN: usize = 32;

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    AwaitingRegistration,
    Registered,
    ShuttingDown,
}

/// The underlying transport, plain or TLS.
enum Stream {
    Tcp(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
    #[cfg(test)]
    Mem(tokio::io::DuplexStream),
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Stream::Tls(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(test)]
            Stream::Mem(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Stream::Tls(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(test)]
            Stream::Mem(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_flush(cx),
            Stream::Tls(s) => Pin::new(s).poll_flush(cx),
            #[cfg(test)]
            Stream::Mem(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Stream::Tls(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(test)]
            Stream::Mem(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// A live connection and everything scoped to it.
pub struct Connection {
    config: Config,
    state: ConnState,
    framed: Framed<Stream, IrcCodec>,
    handshake: HandshakeMachine,
    events: EventRegistry,
    scheduler: Scheduler,
    plugins: PluginRegistry,
    users: UserTable,
    channels: ChannelTable,
    sendq: VecDeque<Message>,
    worker: WorkerPipe,
    worker_rx: mpsc::UnboundedReceiver<String>,
    control: Vec<Control>,
    current_nick: String,
    registered_once: bool,
}

impl Connection {
    /// Open the socket and begin registration.
    pub async fn connect(config: Config, plugins: PluginRegistry) -> Result<Self, ConnectError> {
        let host = config.server.host.clone();
        let port = config.server.port;
        info!(host = %host, port, tls = config.server.tls, "connecting");

        let tcp = TcpStream::connect((host.as_str(), port)).await?;
        let stream = if config.server.tls {
            let mut roots = RootCertStore::empty();
            let native = rustls_native_certs::load_native_certs();
            for err in &native.errors {
                warn!(error = %err, "skipping unreadable root certificate");
            }
            roots.add_parsable_certificates(native.certs);
            let tls_config = ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth();
            let server_name = ServerName::try_from(host.clone())
                .map_err(|_| ConnectError::InvalidServerName(host))?;
            let connector = TlsConnector::from(Arc::new(tls_config));
            Stream::Tls(Box::new(connector.connect(server_name, tcp).await?))
        } else {
            Stream::Tcp(tcp)
        };

        Ok(Self::from_stream(config, plugins, stream))
    }

    #[cfg(test)]
    fn with_stream(config: Config, plugins: PluginRegistry, stream: tokio::io::DuplexStream) -> Self {
        Self::from_stream(config, plugins, Stream::Mem(stream))
    }

    fn from_stream(config: Config, plugins: PluginRegistry, stream: Stream) -> Self {
        let handshake_config = HandshakeConfig {
            nickname: config.identity.nick.clone(),
            username: config.identity.ident.clone(),
            realname: config.identity.realname.clone(),
            password: config.server.password.clone(),
            request_caps: config.server.caps.clone(),
        };
        let (worker, worker_rx) = worker_pipe();
        let mut events = EventRegistry::new();
        events::register_defaults(&mut events);

        let mut conn = Self {
            current_nick: config.identity.nick.clone(),
            config,
            state: ConnState::Connecting,
            framed: Framed::new(stream, IrcCodec::new()),
            handshake: HandshakeMachine::new(handshake_config),
            events,
            scheduler: Scheduler::new(),
            plugins,
            users: UserTable::new(),
            channels: ChannelTable::new(),
            sendq: VecDeque::new(),
            worker,
            worker_rx,
            control: Vec::new(),
            registered_once: false,
        };
        let actions = conn.handshake.start();
        conn.state = ConnState::AwaitingRegistration;
        conn.handle_actions(actions);
        conn
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Our nickname as the server currently knows it.
    pub fn current_nick(&self) -> &str {
        &self.current_nick
    }

    /// Handle for background workers to queue outbound lines.
    pub fn worker(&self) -> WorkerPipe {
        self.worker.clone()
    }

    /// Queue a message for sending, subject to the per-tick rate.
    pub fn send(&mut self, msg: Message) {
        self.sendq.push_back(msg);
    }

    /// One pass of the control loop.
    pub async fn tick(&mut self) -> anyhow::Result<()> {
        // First read waits out the tick's latency budget; lines already
        // buffered behind it are handled in the same tick.
        let mut wait = self.config.timing.read_timeout();
        for _ in 0..MAX_DRAIN {
            match timeout(wait, self.framed.next()).await {
                Ok(Some(Ok(msg))) => self.handle_inbound(msg),
                Ok(Some(Err(e))) => self.handle_decode_error(e)?,
                Ok(None) => return self.peer_closed(),
                Err(_) => break,
            }
            wait = Duration::ZERO;
        }

        self.apply_control();

        if self.state == ConnState::ShuttingDown {
            return Ok(());
        }

        if let Some(msg) = self.sendq.pop_front() {
            trace!(line = %msg.to_string().trim_end(), "send");
            self.framed.send(msg).await?;
        }

        if let Ok(line) = self.worker_rx.try_recv() {
            match line.parse::<Message>() {
                Ok(msg) => self.sendq.push_back(msg),
                Err(e) => warn!(line = %line, error = %e, "worker pipe line dropped"),
            }
        }

        self.scheduler.tick(Instant::now());
        Ok(())
    }

    /// Run ticks until shutdown or the link drops.
    ///
    /// Returns whether the session ever completed registration, which
    /// the reconnect loop uses to reset its backoff.
    pub async fn run(&mut self) -> anyhow::Result<bool> {
        loop {
            if self.state == ConnState::ShuttingDown {
                break;
            }
            if let Err(e) = self.tick().await {
                self.teardown();
                return Err(e);
            }
            tokio::time::sleep(self.config.timing.tick_sleep()).await;
        }
        self.shutdown().await;
        Ok(self.registered_once)
    }

    /// Orderly exit: QUIT, plugin teardown, registry clear.
    pub async fn shutdown(&mut self) {
        self.state = ConnState::ShuttingDown;
        info!("shutting down");
        if let Err(e) = self.framed.send(Message::quit(Some("shutting down".into()))).await {
            debug!(error = %e, "quit not delivered");
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        let mut pctx = PluginContext {
            events: &mut self.events,
            scheduler: &mut self.scheduler,
            config: &self.config,
            now: Instant::now(),
        };
        self.plugins.unload_all(&mut pctx);
        self.scheduler.clear();
        self.events.clear();
        self.sendq.clear();
        self.state = ConnState::Disconnected;
    }

    fn peer_closed(&mut self) -> anyhow::Result<()> {
        self.state = ConnState::Disconnected;
        anyhow::bail!("connection closed by peer")
    }

    /// Parse failures skip the line; transport errors are fatal.
    fn handle_decode_error(&mut self, e: ProtocolError) -> anyhow::Result<()> {
        match e {
            ProtocolError::Io(e) => {
                self.state = ConnState::Disconnected;
                Err(e.into())
            }
            // The codec already logged the offending line.
            other => {
                debug!(error = %other, "bad line skipped");
                Ok(())
            }
        }
    }

    fn handle_inbound(&mut self, msg: Message) {
        trace!(line = %msg.to_string().trim_end(), "recv");

        if self.state == ConnState::AwaitingRegistration {
            let actions = self.handshake.feed(&msg);
            self.handle_actions(actions);
        }

        // Track our own nick through server-acknowledged renames.
        if let Command::NICK(new) = &msg.command {
            if msg.source_nickname() == Some(self.current_nick.as_str()) {
                info!(old = %self.current_nick, new = %new, "own nick changed");
                self.current_nick = new.clone();
            }
        }

        let mut ctx = Context::new(
            &self.current_nick,
            &self.config,
            &mut self.users,
            &mut self.channels,
            &mut self.sendq,
            &mut self.control,
        );
        self.events.map_and_fire(&msg, &mut ctx);
    }

    fn handle_actions(&mut self, actions: Vec<HandshakeAction>) {
        for action in actions {
            match action {
                HandshakeAction::Send(msg) => self.sendq.push_back(*msg),
                HandshakeAction::Complete => {
                    info!(nick = %self.current_nick, "registered");
                    self.state = ConnState::Registered;
                    self.registered_once = true;
                }
                HandshakeAction::Error(e) => {
                    error!(error = %e, "registration failed");
                    self.state = ConnState::ShuttingDown;
                }
            }
        }
    }

    /// Apply deferred handler requests. Loops because a load phase may
    /// itself queue requests.
    fn apply_control(&mut self) {
        while !self.control.is_empty() {
            for req in std::mem::take(&mut self.control) {
                match req {
                    Control::Shutdown => self.state = ConnState::ShuttingDown,
                    Control::LoadPlugins => self.load_plugins(),
                    Control::AddJob {
                        name,
                        interval,
                        recurring,
                        callback,
                    } => {
                        if let Err(e) =
                            self.scheduler
                                .create_job(&name, interval, recurring, Instant::now(), callback)
                        {
                            warn!(error = %e, "job not added");
                        }
                    }
                    Control::RemoveJob(name) => {
                        if let Err(e) = self.scheduler.remove_job(&name) {
                            warn!(error = %e, "job not removed");
                        }
                    }
                }
            }
        }
    }

    fn load_plugins(&mut self) {
        let mut pctx = PluginContext {
            events: &mut self.events,
            scheduler: &mut self.scheduler,
            config: &self.config,
            now: Instant::now(),
        };
        let count = self.plugins.load(&mut pctx);
        info!(count, "plugin load phase complete");

        let signal = Message::from(Command::Raw("PLUGINS_LOADED".into(), Vec::new()));
        let mut ctx = Context::new(
            &self.current_nick,
            &self.config,
            &mut self.users,
            &mut self.channels,
            &mut self.sendq,
            &mut self.control,
        );
        self.events.fire_once(names::PLUGINS_LOADED, &signal, &mut ctx);
    }
}
