//! Client builder and polling loop.
//!
//! The [`ClientBuilder`] collects configuration and object descriptors. The
//! [`Client`] manages the session lifecycle:
//! 1. Check the mandatory objects are registered
//! 2. Open the transport with backoff
//! 3. Send the registration request
//! 4. Poll: reassemble inbound frames, feed the engine, signal changes
//!
//! # Example
//!
//! ```ignore
//! use iotdm_client::{Client, ClientConfig};
//! use iotdm_client::transport::{StreamTransport, TcpConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_connection_string(&std::env::var("DM_CONNECTION")?)?;
//!     let transport = StreamTransport::new(TcpConnector::new(config.host_name.clone(), 5683));
//!
//!     let mut client = Client::builder(config)
//!         .object(server_object())
//!         .object(device_object())
//!         .build(transport, MyCoapEngine::new())?;
//!
//!     client.connect().await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::Notify;

use crate::config::ClientConfig;
use crate::engine::{EngineEvent, ProtocolEngine};
use crate::error::{DmError, Result};
use crate::object::{ObjectDescriptor, ObjectInstance, ObjectRegistry};
use crate::protocol::FrameBuffer;
use crate::session::{
    ConnectionOpener, Registration, RegistrationRequest, RegistrationStatus, RetryPolicy,
    SasTokenSigner, TokenSigner,
};
use crate::transport::Transport;
use crate::writer;

/// Size of the scratch buffer each `recv` reads into.
const READ_CHUNK_SIZE: usize = 4096;

/// Builder for configuring and creating a DM client.
pub struct ClientBuilder {
    config: ClientConfig,
    registry: ObjectRegistry,
    signer: Option<Box<dyn TokenSigner>>,
}

impl ClientBuilder {
    /// Create a builder from a configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            registry: ObjectRegistry::new(),
            signer: None,
        }
    }

    /// Create a builder from a device connection string.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        Ok(Self::new(ClientConfig::from_connection_string(
            connection_string,
        )?))
    }

    /// Register an object type.
    ///
    /// Registering the same object id twice keeps the first descriptor.
    pub fn object<T>(mut self, descriptor: ObjectDescriptor<T>) -> Self
    where
        T: ObjectInstance + Send + 'static,
    {
        self.registry.insert(Box::new(descriptor));
        self
    }

    /// Replace the default SAS token signer.
    pub fn signer(mut self, signer: impl TokenSigner + 'static) -> Self {
        self.signer = Some(Box::new(signer));
        self
    }

    /// Set the reconnect backoff.
    ///
    /// Default: 1 second doubling up to 36000
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Set the pause between polling passes in `run`.
    ///
    /// Default: 1 second
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the registration lifetime advertised to the server.
    ///
    /// Default: 300 seconds
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.config.lifetime_secs = lifetime.as_secs();
        self
    }

    /// Set how long the engine waits on a confirmable notification.
    ///
    /// Default: 60 seconds
    pub fn notify_timeout(mut self, timeout: Duration) -> Self {
        self.config.notify_timeout_secs = timeout.as_secs();
        self
    }

    /// Set the receive buffer size, length prefix included.
    ///
    /// Default: 1024
    pub fn max_frame_buffer(mut self, capacity: usize) -> Self {
        self.config.max_frame_buffer = capacity;
        self
    }

    /// Validate the configuration and build the client.
    pub fn build(
        self,
        transport: impl Transport + 'static,
        engine: impl ProtocolEngine + 'static,
    ) -> Result<Client> {
        self.config.validate().map_err(DmError::InvalidConfig)?;

        let signer: Box<dyn TokenSigner> = match self.signer {
            Some(signer) => signer,
            None => Box::new(SasTokenSigner::new(self.config.token_lifetime())),
        };

        Ok(Client {
            opener: ConnectionOpener::new(self.config.retry),
            frames: FrameBuffer::with_capacity(self.config.max_frame_buffer),
            config: self.config,
            registry: self.registry,
            signer,
            transport: Box::new(transport),
            engine: Box::new(engine),
            registration: Registration::new(),
            read_buf: vec![0u8; READ_CHUNK_SIZE],
            wake: Arc::new(Notify::new()),
        })
    }
}

/// Cuts the pause between `run` passes short.
///
/// Obtained from [`Client::wake_handle`]. A wake that arrives while `run` is
/// busy is kept and ends the next pause immediately.
#[derive(Clone)]
pub struct WakeHandle {
    notify: Arc<Notify>,
}

impl WakeHandle {
    /// Start the next polling pass now.
    pub fn wake(&self) {
        self.notify.notify_one();
    }
}

/// A DM session with a server.
///
/// All work happens on the caller's task: `connect` blocks through the
/// backoff, `do_work` processes whatever is pending and returns.
pub struct Client {
    config: ClientConfig,
    registry: ObjectRegistry,
    signer: Box<dyn TokenSigner>,
    transport: Box<dyn Transport>,
    engine: Box<dyn ProtocolEngine>,
    opener: ConnectionOpener,
    frames: FrameBuffer,
    registration: Registration,
    read_buf: Vec<u8>,
    wake: Arc<Notify>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Mutable registry access, e.g. to add instances after startup.
    pub fn registry_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.registry
    }

    pub fn status(&self) -> RegistrationStatus {
        self.registration.status()
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn is_shutting_down(&self) -> bool {
        self.frames.is_shut_down()
    }

    /// Handle for waking `run` from another task, e.g. after resources
    /// changed.
    pub fn wake_handle(&self) -> WakeHandle {
        WakeHandle {
            notify: Arc::clone(&self.wake),
        }
    }

    /// Open the transport and register with the server.
    ///
    /// The future stays pending through the whole backoff. On success the
    /// session is `Pending` until the reply is processed by `do_work`.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_shutting_down() {
            return Err(DmError::ShuttingDown);
        }
        if !self.registry.mandatory_objects_exist() {
            tracing::error!("Server and Device objects must be registered before connecting");
            return Err(DmError::MissingMandatoryObjects);
        }

        if let Err(e) = self.opener.open(self.transport.as_mut()).await {
            self.registration.fail();
            return Err(e);
        }

        self.register().await
    }

    /// Build and send the registration request.
    async fn register(&mut self) -> Result<()> {
        let request = RegistrationRequest::new(
            &self.config.device_id,
            &self.config.host_name,
            &self.config.device_key,
            self.config.lifetime_secs,
            &self.registry,
            &*self.signer,
        )?;
        let message = self.engine.encode_registration(&request)?;

        let started = SystemTime::now();
        writer::send_message(self.transport.as_mut(), message).await?;
        self.registration.mark_pending(started);
        Ok(())
    }

    /// One polling pass.
    ///
    /// Returns `false` once the session failed or the client is shutting
    /// down; the caller should stop polling then.
    pub async fn do_work(&mut self) -> bool {
        if self.is_shutting_down() {
            tracing::info!("Client is shutting down");
            return false;
        }

        if self.transport.is_open() {
            self.pump_input().await;
        }

        match self.registration.status() {
            RegistrationStatus::Registered => {
                let changed = self.registry.signal_all_resource_changes();
                if !changed.is_empty() {
                    self.engine.resource_changed(&changed);
                }
                self.step_engine().await;
            }
            RegistrationStatus::Pending => {
                self.step_engine().await;
            }
            RegistrationStatus::Idle => {}
            RegistrationStatus::Failed => {
                tracing::error!("Registration request failed");
                return false;
            }
        }

        self.registration.status() != RegistrationStatus::Failed
    }

    /// Poll until the session fails or the client is closed.
    ///
    /// Passes are `poll_interval` apart unless a [`WakeHandle`] fires.
    pub async fn run(&mut self) -> Result<()> {
        while self.do_work().await {
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
                _ = self.wake.notified() => {
                    tracing::trace!("Woken before poll interval");
                }
            }
        }

        if self.is_shutting_down() {
            Ok(())
        } else {
            Err(DmError::RegistrationFailed)
        }
    }

    /// Feed received bytes through reassembly into the engine.
    ///
    /// Returns `false` if a send failed and the connection was replaced.
    /// Frames from `data` still queued at that point belong to the lost
    /// connection and are dropped.
    pub async fn on_bytes_received(&mut self, data: &[u8]) -> bool {
        let frames = self.frames.push(data);
        let total = frames.len();

        for (index, frame) in frames.into_iter().enumerate() {
            let events = self.engine.handle_message(frame.payload(), &mut self.registry);
            if !self.process_events(events).await {
                let dropped = total - index - 1;
                if dropped > 0 {
                    tracing::debug!("Dropped {} frames from the lost connection", dropped);
                }
                return false;
            }
        }
        true
    }

    /// Stop polling and close the transport.
    pub async fn close(&mut self) -> Result<()> {
        self.frames.shutdown();
        self.transport.close().await
    }

    async fn pump_input(&mut self) {
        let mut buf = std::mem::take(&mut self.read_buf);

        while !self.is_shutting_down() {
            match self.transport.recv(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if !self.on_bytes_received(&buf[..n]).await {
                        break;
                    }
                }
                Err(e) => {
                    if let Err(e) = self.reconnect(e).await {
                        tracing::error!("Reconnect failed: {}", e);
                    }
                    break;
                }
            }
        }

        self.read_buf = buf;
    }

    async fn step_engine(&mut self) {
        let events = self.engine.step(
            SystemTime::now(),
            self.config.notify_timeout(),
            &mut self.registry,
        );
        self.process_events(events).await;
    }

    /// Act on engine events in order.
    ///
    /// Returns `false` if a send failed. The transport was reconnected then
    /// and the remaining events, which belong to the reset engine, are
    /// dropped.
    async fn process_events(&mut self, events: Vec<EngineEvent>) -> bool {
        let total = events.len();

        for (index, event) in events.into_iter().enumerate() {
            match event {
                EngineEvent::Send(message) => {
                    if let Err(e) = writer::send_message(self.transport.as_mut(), message).await {
                        if let Err(e) = self.reconnect(e).await {
                            tracing::error!("Reconnect failed: {}", e);
                        }
                        let dropped = total - index - 1;
                        if dropped > 0 {
                            tracing::debug!("Dropped {} engine events after reconnect", dropped);
                        }
                        return false;
                    }
                }
                EngineEvent::RegistrationReply(reply) => {
                    self.registration.on_reply(reply.as_ref());
                }
            }
        }
        true
    }

    /// Reopen the transport after an I/O failure.
    ///
    /// An accepted or in-flight registration is sent again once the
    /// transport is back.
    async fn reconnect(&mut self, cause: DmError) -> Result<()> {
        tracing::warn!("Connection lost: {}", cause);

        let resume = matches!(
            self.registration.status(),
            RegistrationStatus::Registered | RegistrationStatus::Pending
        );

        if let Err(e) = self.transport.close().await {
            tracing::debug!("Close after connection loss failed: {}", e);
        }
        self.frames.clear();
        self.engine.reset();

        if let Err(e) = self.opener.open(self.transport.as_mut()).await {
            self.registration.fail();
            return Err(e);
        }

        if resume {
            if let Err(e) = self.register().await {
                self.registration.fail();
                return Err(e);
            }
        }
        Ok(())
    }
}
