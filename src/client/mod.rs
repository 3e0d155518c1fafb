//! The client to the obs-websocket API and main entry point.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, Stream, StreamExt},
};
use tokio::{
    net::TcpStream,
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
    time,
};
use tokio_tungstenite::{
    tungstenite::{
        client::IntoClientRequest,
        http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderValue, Uri},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, trace, warn};

pub use self::{
    batch::{Batch, BatchOutcome, BatchResponses},
    connection::{CloseDetails, HandshakeError},
};
use self::{
    connection::{BatchReceiverList, ReceiverList},
    state::SessionState,
};
use crate::{
    events::{EventStreamError, EventType, RawEvent},
    requests::{
        scenes::{GetCurrentPreviewScene, GetCurrentProgramScene},
        ui::GetStudioModeEnabled,
        BatchRequest, ClientRequest, EventSubscription, ExecutionType, Reidentify, Request,
        RequestBatch, RequestType,
    },
    responses::{RequestBatchResponse, ServerMessage},
    Error, Result,
};

mod batch;
mod connection;
mod state;

/// Shorthand for the writer side of a websocket stream that has been split
/// into reader and writer.
type MessageWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Default broadcast capacity used when not overwritten by the user.
const DEFAULT_CAPACITY: usize = 100;

/// Default timeout for establishing the connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// The subprotocol this library advertises during the websocket upgrade.
const SUBPROTOCOL: &str = "obswebsocket.json";

/// Configuration for connecting to an obs-websocket instance.
pub struct ConnectConfig<H = String, P = String>
where
    H: AsRef<str>,
    P: AsRef<str>,
{
    /// The hostname, usually `localhost` unless the server runs on a remote
    /// machine.
    pub host: H,
    /// Port to connect to.
    pub port: u16,
    /// The password, if the server demands authentication.
    pub password: Option<P>,
    /// Event categories the server should deliver. Leaving this out
    /// subscribes to all non-high-volume categories.
    pub event_subscriptions: Option<EventSubscription>,
    /// Capacity of the broadcast channel that fans events out to
    /// subscribers. Subscribers that fall further behind than this many
    /// events are dropped from their stream.
    pub broadcast_capacity: usize,
    /// Abort connecting after this long.
    pub connect_timeout: Duration,
    /// Whether to use TLS when connecting. Only useful when the server runs
    /// on a remote machine.
    #[cfg(feature = "tls")]
    pub tls: bool,
}

impl<H, P> ConnectConfig<H, P>
where
    H: AsRef<str>,
    P: AsRef<str>,
{
    /// Create a configuration with default timeout, capacity and event
    /// subscriptions.
    pub fn new(host: H, port: u16, password: Option<P>) -> Self {
        Self {
            host,
            port,
            password,
            event_subscriptions: None,
            broadcast_capacity: DEFAULT_CAPACITY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            #[cfg(feature = "tls")]
            tls: false,
        }
    }

    #[cfg(feature = "tls")]
    fn tls(&self) -> bool {
        self.tls
    }

    #[cfg(not(feature = "tls"))]
    fn tls(&self) -> bool {
        false
    }
}

impl ConnectConfig<String, String> {
    /// Parse a `scheme://host:port[/password]` connect URL.
    ///
    /// The scheme picks between `ws` and `wss`, and the path segment, when
    /// present, is the password itself.
    pub fn from_url(url: &str) -> Result<Self> {
        let uri = url
            .parse::<Uri>()
            .map_err(|_| Error::InvalidUrl("not a valid URI"))?;

        let tls = match uri.scheme_str() {
            Some("ws") => false,
            Some("wss") => true,
            _ => return Err(Error::InvalidUrl("unsupported scheme, expected `ws` or `wss`")),
        };

        #[cfg(not(feature = "tls"))]
        if tls {
            return Err(Error::InvalidUrl("`wss` requires the `tls` feature"));
        }

        let host = uri
            .host()
            .ok_or(Error::InvalidUrl("missing host"))?
            .to_owned();
        let port = uri.port_u16().ok_or(Error::InvalidUrl("missing port"))?;
        let password = match uri.path() {
            "" | "/" => None,
            path => Some(path.trim_start_matches('/').to_owned()),
        };

        let mut config = Self::new(host, port, password);
        #[cfg(feature = "tls")]
        {
            config.tls = tls;
        }
        #[cfg(not(feature = "tls"))]
        let _ = tls;

        Ok(config)
    }
}

/// The client is the main entry point of this crate. It holds one live
/// session, dispatches typed requests and batches over it, fans server
/// events out to subscribers, and tracks the session's observable state.
#[derive(Debug)]
pub struct Client {
    /// The writer handle to the websocket stream.
    write: Mutex<MessageWriter>,
    /// Counter that hands out correlation IDs for requests and batches.
    id_counter: AtomicU64,
    /// In-flight requests, keyed by correlation ID.
    receivers: Arc<ReceiverList>,
    /// In-flight request batches, keyed by batch ID.
    batches: Arc<BatchReceiverList>,
    /// Fan-out channel for server events. Held weakly so event streams end
    /// when the reader task drops the sending side.
    event_sender: Weak<broadcast::Sender<RawEvent>>,
    /// Connection-status signal, `true` while the session is usable.
    status: Arc<watch::Sender<bool>>,
    /// Studio-mode flag and scene names, kept current by the reader task.
    state: Arc<SessionState>,
    /// RPC version the server agreed to during identification.
    negotiated_rpc_version: u32,
    /// Handle to the reader task, used to shut the session down.
    handle: Option<JoinHandle<()>>,
}

impl Client {
    /// Connect to an obs-websocket instance on the given host and port,
    /// using default settings.
    pub async fn connect(
        host: impl AsRef<str>,
        port: u16,
        password: Option<impl AsRef<str>>,
    ) -> Result<Self> {
        Self::connect_with_config(ConnectConfig::new(host, port, password)).await
    }

    /// Connect to an obs-websocket instance described by a
    /// `scheme://host:port[/password]` URL.
    pub async fn connect_url(url: &str) -> Result<Self> {
        Self::connect_with_config(ConnectConfig::from_url(url)?).await
    }

    /// Connect to an obs-websocket instance with the given configuration.
    pub async fn connect_with_config<H, P>(config: ConnectConfig<H, P>) -> Result<Self>
    where
        H: AsRef<str>,
        P: AsRef<str>,
    {
        let mut request = format!(
            "{}://{}:{}",
            if config.tls() { "wss" } else { "ws" },
            config.host.as_ref(),
            config.port,
        )
        .into_client_request()
        .map_err(Error::Connect)?;
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));

        let (socket, _) = time::timeout(
            config.connect_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(Error::Connect)?;

        let (mut write, mut read) = socket.split();

        let identified = connection::handshake(
            &mut write,
            &mut read,
            config.password.as_ref().map(AsRef::as_ref),
            config.event_subscriptions,
        )
        .await?;

        let receivers = Arc::new(ReceiverList::default());
        let batches = Arc::new(BatchReceiverList::default());
        let state = Arc::new(SessionState::default());
        let (event_sender, _) = broadcast::channel(config.broadcast_capacity);
        let event_sender = Arc::new(event_sender);
        let (status, _) = watch::channel(true);
        let status = Arc::new(status);

        let handle = tokio::spawn({
            let receivers = Arc::clone(&receivers);
            let batches = Arc::clone(&batches);
            let state = Arc::clone(&state);
            let events_tx = Arc::clone(&event_sender);
            let status = Arc::clone(&status);

            async move {
                loop {
                    match read.next().await {
                        Some(Ok(Message::Text(text))) => {
                            trace!(%text, "received message");
                            if let Err(error) = dispatch(&text, &receivers, &batches, &events_tx, &state) {
                                error!(%error, "failed handling message");
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let details = frame.map(|frame| CloseDetails {
                                code: u16::from(frame.code),
                                reason: frame.reason.into_owned(),
                            });
                            match &details {
                                Some(details) => warn!(
                                    code = details.code,
                                    obs_code = ?details.close_code(),
                                    reason = %details.reason,
                                    "server closed the connection",
                                ),
                                None => debug!("server closed the connection"),
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(error)) => {
                            error!(%error, "websocket failure, shutting the session down");
                            break;
                        }
                        None => break,
                    }
                }

                status.send_replace(false);
                receivers.reset();
                batches.reset();
                // Dropping `events_tx` here ends all event streams.
            }
        });

        let client = Self {
            write: Mutex::new(write),
            id_counter: AtomicU64::new(1),
            receivers,
            batches,
            event_sender: Arc::downgrade(&event_sender),
            status,
            state,
            negotiated_rpc_version: identified.negotiated_rpc_version,
            handle: Some(handle),
        };

        client.prime_session_state().await?;

        Ok(client)
    }

    /// Query the studio-mode flag and the current scene names once, right
    /// after identification. Afterwards the reader task keeps them current
    /// from the matching events.
    async fn prime_session_state(&self) -> Result<()> {
        let studio = self.send(&GetStudioModeEnabled).await?;
        self.state.set_studio_mode_enabled(studio.studio_mode_enabled);

        if studio.studio_mode_enabled {
            let preview = self.send(&GetCurrentPreviewScene).await?;
            self.state
                .set_preview_scene(preview.current_preview_scene_name);
        }

        let program = self.send(&GetCurrentProgramScene).await?;
        self.state
            .set_program_scene(program.current_program_scene_name);

        Ok(())
    }

    /// Send a request and wait for its response.
    ///
    /// The request is correlated by a fresh ID, so concurrent calls from
    /// different tasks resolve independently, whatever order the server
    /// answers in. Dropping the returned future cancels the request; a
    /// response arriving afterwards is discarded.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotConnected`] when the session is down,
    /// [`Error::RequestFailed`] when the server reports a failure status,
    /// and [`Error::Disconnected`] when the session ends while waiting.
    pub async fn send<R: RequestType>(&self, request: &R) -> Result<R::Response> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let data = serialize_request_data(request)?;
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let request_id = id.to_string();
        let json = serde_json::to_string(&ClientRequest::Request(Request {
            request_id: &request_id,
            request_type: R::NAME,
            request_data: data,
        }))
        .map_err(Error::SerializeMessage)?;

        let rx = self.receivers.add(id);

        debug!(id, ty = R::NAME, "sending request");
        if let Err(error) = self.send_raw(json).await {
            self.receivers.remove(id);
            return Err(error);
        }

        let (status, data) = rx.await.map_err(|_| Error::Disconnected)?;

        if !status.result {
            return Err(Error::RequestFailed {
                code: status.code,
                comment: status.comment,
            });
        }

        serde_json::from_value(data).map_err(Error::DeserializeResponse)
    }

    /// Update the session's event subscriptions. Fire-and-forget: the
    /// server's confirmation is not awaited.
    pub async fn reidentify(&self, event_subscriptions: Option<EventSubscription>) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let json = serde_json::to_string(&ClientRequest::Reidentify(Reidentify {
            event_subscriptions,
        }))
        .map_err(Error::SerializeMessage)?;

        self.send_raw(json).await
    }

    /// Transmit a prepared batch and wait for the matching batch response.
    pub(crate) async fn send_batch_message(
        &self,
        halt_on_failure: Option<bool>,
        execution_type: ExecutionType,
        requests: &[BatchRequest],
    ) -> Result<RequestBatchResponse> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let request_id = id.to_string();
        let json = serde_json::to_string(&ClientRequest::RequestBatch(RequestBatch {
            request_id: &request_id,
            halt_on_failure,
            execution_type: Some(execution_type),
            requests,
        }))
        .map_err(Error::SerializeMessage)?;

        let rx = self.batches.add(id);

        debug!(id, len = requests.len(), "sending request batch");
        if let Err(error) = self.send_raw(json).await {
            self.batches.remove(id);
            return Err(error);
        }

        rx.await.map_err(|_| Error::Disconnected)
    }

    async fn send_raw(&self, json: String) -> Result<()> {
        self.write
            .lock()
            .await
            .send(Message::text(json))
            .await
            .map_err(Error::Send)
    }

    /// Get a stream over all future events of one type.
    ///
    /// The stream yields decoded payloads for every event whose
    /// discriminator matches `E`, in server-send order, and ends when the
    /// session does. An event that matches but fails to decode is delivered
    /// as an [`EventStreamError::Decode`] item, leaving the stream and other
    /// subscribers intact. A subscriber that falls behind the fan-out
    /// channel receives one [`EventStreamError::Lagged`] item and its stream
    /// ends; the session's receive loop is never blocked by slow consumers.
    ///
    /// **Note**: To iterate the stream, pin it first, for example with
    /// [`futures_util::pin_mut`].
    ///
    /// # Errors
    ///
    /// Creating the stream fails with [`Error::Disconnected`] when the
    /// session is down.
    pub fn events<E: EventType>(
        &self,
    ) -> Result<impl Stream<Item = Result<E, EventStreamError>>> {
        let mut rx = self.subscribe()?;

        Ok(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(raw) if raw.event_type == E::NAME => {
                        yield serde_json::from_value(raw.event_data)
                            .map_err(EventStreamError::Decode);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        yield Err(EventStreamError::Lagged(missed));
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Get a merged stream over all future events whose discriminator is in
    /// the given set, delivered undecoded.
    ///
    /// Lag handling matches [`Client::events`].
    pub fn events_by_name(
        &self,
        types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<impl Stream<Item = Result<RawEvent, EventStreamError>>> {
        let types = types.into_iter().map(Into::into).collect::<Vec<_>>();
        let mut rx = self.subscribe()?;

        Ok(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(raw) if types.iter().any(|ty| *ty == raw.event_type) => yield Ok(raw),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        yield Err(EventStreamError::Lagged(missed));
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Wait for the next event of one type and return its decoded payload.
    pub async fn wait_for<E: EventType>(&self) -> Result<E> {
        let mut rx = self.subscribe()?;

        loop {
            match rx.recv().await {
                Ok(raw) if raw.event_type == E::NAME => {
                    return serde_json::from_value(raw.event_data)
                        .map_err(Error::DeserializeResponse);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "lagged while waiting for an event");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(Error::Disconnected),
            }
        }
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<RawEvent>> {
        self.event_sender
            .upgrade()
            .map(|sender| sender.subscribe())
            .ok_or(Error::Disconnected)
    }

    /// Get a watch over the connection status. The value is `true` while
    /// the session is usable and flips to `false`, permanently, once the
    /// connection is gone.
    pub fn status(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    /// Whether the session is currently usable.
    pub fn is_connected(&self) -> bool {
        *self.status.borrow()
    }

    /// RPC version negotiated with the server at identification.
    pub fn negotiated_rpc_version(&self) -> u32 {
        self.negotiated_rpc_version
    }

    /// Whether studio mode is enabled on the server.
    pub fn studio_mode_enabled(&self) -> bool {
        self.state.studio_mode_enabled()
    }

    /// Name of the scene on program output.
    pub fn current_program_scene(&self) -> Option<String> {
        self.state.program_scene()
    }

    /// Name of the scene on preview, while studio mode is enabled.
    pub fn current_preview_scene(&self) -> Option<String> {
        self.state.preview_scene()
    }

    /// Name of the scene the user is working on: the preview while studio
    /// mode is enabled, the program scene otherwise.
    pub fn current_scene(&self) -> Option<String> {
        self.state.current_scene()
    }

    /// Disconnect from the server and shut down all machinery, completing
    /// every pending operation with [`Error::Disconnected`].
    ///
    /// This is called automatically when dropping the client, but dropping
    /// can't wait for the reader task to finish. Call this manually when the
    /// client is no longer needed.
    pub async fn disconnect(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            handle.await.ok();
        }

        self.shutdown();
    }

    fn shutdown(&self) {
        self.status.send_replace(false);
        self.receivers.reset();
        self.batches.reset();
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.shutdown();
    }
}

/// Route one decoded message to the part of the session that awaits it.
fn dispatch(
    text: &str,
    receivers: &ReceiverList,
    batches: &BatchReceiverList,
    events_tx: &broadcast::Sender<RawEvent>,
    state: &SessionState,
) -> Result<(), serde_json::Error> {
    match serde_json::from_str::<ServerMessage>(text)? {
        ServerMessage::Event(raw) => {
            state.apply_event(&raw);
            // Sending fails when nobody listens, which is fine.
            events_tx.send(raw).ok();
        }
        ServerMessage::RequestResponse(response) => receivers.notify(response),
        ServerMessage::RequestBatchResponse(response) => batches.notify(response),
        ServerMessage::Identified(identified) => debug!(
            rpc_version = identified.negotiated_rpc_version,
            "session parameters updated",
        ),
        ServerMessage::Hello(_) => warn!("unexpected `Hello` on an identified session, dropping"),
    }

    Ok(())
}

/// Serialize a request's payload, reducing the `null` of field-less requests
/// to an omitted data field.
pub(crate) fn serialize_request_data<R: RequestType>(
    request: &R,
) -> Result<Option<serde_json::Value>> {
    serde_json::to_value(request)
        .map(|value| (!value.is_null()).then_some(value))
        .map_err(Error::SerializeMessage)
}
