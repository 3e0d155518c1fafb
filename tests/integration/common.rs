use std::net::Ipv4Addr;

use anyhow::{bail, ensure, Context, Result};
use base64::{engine::general_purpose, Engine};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_tungstenite::{
    tungstenite::{
        handshake::server::{Request as HandshakeRequest, Response as HandshakeResponse},
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message,
    },
    WebSocketStream,
};
use tracing::{debug, info};

pub const PASSWORD: &str = "mock-password";
pub const CHALLENGE: &str = "mock-challenge";
pub const SALT: &str = "mock-salt";
pub const PROGRAM_SCENE: &str = "Mock-Program";
pub const PREVIEW_SCENE: &str = "Mock-Preview";

/// Spin up a mock server with default settings and a client connected to it.
pub async fn new_client() -> Result<(obsession::Client, MockServer)> {
    let (server, port) = MockServer::start(Session::builder().build()).await?;
    let client = obsession::Client::connect("localhost", port, Some(PASSWORD)).await?;

    Ok((client, server))
}

/// Behavior knobs for one mock session.
#[derive(Clone, Copy, bon::Builder)]
pub struct Session {
    /// Demand authentication in the `Hello`.
    #[builder(default = true)]
    pub auth: bool,
    /// Close with code 4009 instead of answering the `Identify`.
    #[builder(default = false)]
    pub reject_auth: bool,
    /// Report studio mode as enabled during state priming.
    #[builder(default = false)]
    pub studio_mode: bool,
    #[builder(default = 1)]
    pub rpc: u32,
}

/// One scripted response the mock sends when the next matching request
/// arrives.
pub struct Expectation {
    name: String,
    req: Value,
    response: ScriptedResponse,
}

enum ScriptedResponse {
    Ok(Value),
    Err { code: u16, comment: Option<String> },
}

/// Scripted outcome for one element of a request batch.
pub struct BatchScript {
    ok: bool,
    code: u16,
    comment: Option<String>,
    rsp: Value,
}

impl BatchScript {
    pub fn ok(rsp: Value) -> Self {
        Self {
            ok: true,
            code: 100,
            comment: None,
            rsp,
        }
    }

    pub fn err(code: u16, comment: &str) -> Self {
        Self {
            ok: false,
            code,
            comment: Some(comment.to_owned()),
            rsp: Value::Null,
        }
    }
}

enum Command {
    Expect(Expectation),
    /// Collect as many requests as there are expectations, then answer them
    /// in reverse arrival order.
    ExpectReversed(Vec<Expectation>),
    ExpectBatch(Vec<BatchScript>),
    /// Consume one request without ever answering it.
    Swallow,
}

pub struct MockServer {
    handle: JoinHandle<Result<()>>,
    shutdown: Option<oneshot::Sender<()>>,
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedSender<(String, u32, Value)>,
}

impl MockServer {
    pub async fn start(session: Session) -> Result<(Self, u16)> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let port = listener.local_addr()?.port();
        debug!(port, "mock server started");

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<(String, u32, Value)>();

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            let mut stream = tokio_tungstenite::accept_hdr_async(
                stream,
                |req: &HandshakeRequest, mut response: HandshakeResponse| {
                    if let Some(protocol) = req.headers().get("Sec-WebSocket-Protocol") {
                        response
                            .headers_mut()
                            .insert("Sec-WebSocket-Protocol", protocol.clone());
                    }
                    Ok(response)
                },
            )
            .await?;
            debug!("client connected");

            if !handshake(&mut stream, session).await? {
                return Ok(());
            }
            prime_state(&mut stream, session).await?;
            debug!("handshake and state priming done");

            let mut reversed: Option<(Vec<Expectation>, Vec<(String, String, Value)>)> = None;

            loop {
                select! {
                    _ = &mut shutdown_rx => break,
                    Some(msg) = stream.next() => {
                        handle_message(&mut stream, &mut command_rx, &mut reversed, msg?).await?;
                    }
                    Some((ty, intent, data)) = event_rx.recv() => {
                        let payload = json!({"eventType": ty, "eventIntent": intent, "eventData": data});
                        stream.send(envelope(5, payload)).await?;
                    }
                }
            }

            anyhow::Ok(())
        });

        Ok((
            Self {
                handle,
                shutdown: Some(shutdown_tx),
                commands: command_tx,
                events: event_tx,
            },
            port,
        ))
    }

    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
        self.handle.await?
    }

    pub fn expect(&self, name: &str, req: Value, rsp: Value) {
        self.command(Command::Expect(Expectation {
            name: name.to_owned(),
            req,
            response: ScriptedResponse::Ok(rsp),
        }));
    }

    pub fn expect_err(&self, name: &str, req: Value, code: u16, comment: &str) {
        self.command(Command::Expect(Expectation {
            name: name.to_owned(),
            req,
            response: ScriptedResponse::Err {
                code,
                comment: Some(comment.to_owned()),
            },
        }));
    }

    /// Expect all given requests, in any order, and answer them in reverse
    /// arrival order once the last one arrived.
    pub fn expect_reversed(&self, expectations: Vec<(&str, Value, Value)>) {
        self.command(Command::ExpectReversed(
            expectations
                .into_iter()
                .map(|(name, req, rsp)| Expectation {
                    name: name.to_owned(),
                    req,
                    response: ScriptedResponse::Ok(rsp),
                })
                .collect(),
        ));
    }

    pub fn expect_batch(&self, scripts: Vec<BatchScript>) {
        self.command(Command::ExpectBatch(scripts));
    }

    /// Swallow the next request, leaving its caller waiting forever.
    pub fn swallow(&self) {
        self.command(Command::Swallow);
    }

    pub fn send_event(&self, ty: &str, intent: u32, data: Value) {
        self.events.send((ty.to_owned(), intent, data)).unwrap();
    }

    fn command(&self, command: Command) {
        self.commands.send(command).unwrap();
    }
}

fn envelope(op: u8, d: Value) -> Message {
    Message::text(json!({"op": op, "d": d}).to_string())
}

fn response_payload(ty: &str, id: &str, response: &ScriptedResponse) -> Value {
    match response {
        ScriptedResponse::Ok(rsp) => json!({
            "requestType": ty,
            "requestId": id,
            "requestStatus": {"result": true, "code": 100},
            "responseData": rsp,
        }),
        ScriptedResponse::Err { code, comment } => json!({
            "requestType": ty,
            "requestId": id,
            "requestStatus": {"result": false, "code": code, "comment": comment},
        }),
    }
}

/// Run the server side of the identification exchange. Returns `false` when
/// the session was scripted to end during it.
async fn handshake(stream: &mut WebSocketStream<TcpStream>, session: Session) -> Result<bool> {
    let authentication = session
        .auth
        .then(|| json!({"challenge": CHALLENGE, "salt": SALT}));

    stream
        .send(envelope(
            0,
            json!({
                "obsWebSocketVersion": "5.5.0",
                "rpcVersion": session.rpc,
                "authentication": authentication,
            }),
        ))
        .await?;

    let identify = stream.next().await.context("no message from client")??;
    let ClientMessage::Identify(identify) =
        serde_json::from_str::<ClientMessage>(identify.to_text()?)?
    else {
        bail!("expected an `Identify` message first");
    };

    ensure!(identify.rpc_version == session.rpc);

    if session.auth {
        let mut hasher = Sha256::new();
        hasher.update(PASSWORD.as_bytes());
        hasher.update(SALT.as_bytes());

        let secret = general_purpose::STANDARD.encode(hasher.finalize_reset());
        hasher.update(secret.as_bytes());
        hasher.update(CHALLENGE.as_bytes());

        let auth = general_purpose::STANDARD.encode(hasher.finalize());
        ensure!(Some(auth) == identify.authentication, "wrong auth string");
    } else {
        ensure!(identify.authentication.is_none());
    }

    if session.reject_auth {
        stream
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Library(4009),
                reason: "authentication failed".into(),
            })))
            .await?;
        return Ok(false);
    }

    stream
        .send(envelope(2, json!({"negotiatedRpcVersion": session.rpc})))
        .await?;

    Ok(true)
}

/// Answer the state-priming requests the client issues right after
/// identification.
async fn prime_state(stream: &mut WebSocketStream<TcpStream>, session: Session) -> Result<()> {
    loop {
        let msg = stream.next().await.context("no message from client")??;
        let ClientMessage::Request(request) = serde_json::from_str(msg.to_text()?)? else {
            bail!("expected a request during state priming");
        };

        let rsp = match request.request_type.as_str() {
            "GetStudioModeEnabled" => json!({"studioModeEnabled": session.studio_mode}),
            "GetCurrentPreviewScene" => {
                ensure!(session.studio_mode, "preview queried without studio mode");
                json!({"currentPreviewSceneName": PREVIEW_SCENE})
            }
            "GetCurrentProgramScene" => json!({"currentProgramSceneName": PROGRAM_SCENE}),
            other => bail!("unexpected request during state priming: {other}"),
        };

        let done = request.request_type == "GetCurrentProgramScene";
        stream
            .send(envelope(
                7,
                response_payload(
                    &request.request_type,
                    &request.request_id,
                    &ScriptedResponse::Ok(rsp),
                ),
            ))
            .await?;

        if done {
            return Ok(());
        }
    }
}

async fn handle_message(
    stream: &mut WebSocketStream<TcpStream>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    reversed: &mut Option<(Vec<Expectation>, Vec<(String, String, Value)>)>,
    msg: Message,
) -> Result<()> {
    let msg = serde_json::from_str::<ClientMessage>(msg.to_text()?)?;
    info!(message = ?msg, "received");

    match msg {
        ClientMessage::Identify(_) => bail!("should never get a second `Identify`"),
        ClientMessage::Reidentify(reidentify) => {
            debug!(?reidentify, "reidentification requested");
            stream
                .send(envelope(2, json!({"negotiatedRpcVersion": 1})))
                .await?;
        }
        ClientMessage::Request(request) => {
            if reversed.is_none() {
                match commands.recv().await.context("no command for request")? {
                    Command::Expect(expect) => {
                        ensure!(expect.name == request.request_type);
                        ensure!(expect.req == request.request_data);

                        stream
                            .send(envelope(
                                7,
                                response_payload(
                                    &request.request_type,
                                    &request.request_id,
                                    &expect.response,
                                ),
                            ))
                            .await?;
                        return Ok(());
                    }
                    Command::ExpectReversed(expectations) => {
                        *reversed = Some((expectations, Vec::new()));
                    }
                    Command::Swallow => {
                        debug!(ty = %request.request_type, "swallowing request");
                        return Ok(());
                    }
                    Command::ExpectBatch(_) => bail!("batch command for a single request"),
                }
            }

            let Some((expectations, arrived)) = reversed.as_mut() else {
                unreachable!()
            };

            let position = expectations
                .iter()
                .position(|expect| {
                    expect.name == request.request_type && expect.req == request.request_data
                })
                .context("request matches no expectation")?;
            let expect = expectations.remove(position);
            let ScriptedResponse::Ok(rsp) = expect.response else {
                bail!("reversed expectations only script successes");
            };
            arrived.push((request.request_type, request.request_id, rsp));

            if expectations.is_empty() {
                let (_, arrived) = reversed.take().context("state vanished")?;
                for (ty, id, rsp) in arrived.into_iter().rev() {
                    stream
                        .send(envelope(
                            7,
                            response_payload(&ty, &id, &ScriptedResponse::Ok(rsp)),
                        ))
                        .await?;
                }
            }
        }
        ClientMessage::RequestBatch(batch) => {
            let Command::ExpectBatch(scripts) =
                commands.recv().await.context("no command for batch")?
            else {
                bail!("non-batch command for a batch request");
            };
            ensure!(scripts.len() == batch.requests.len());

            let mut results = Vec::new();
            for (entry, script) in batch.requests.iter().zip(scripts) {
                let mut status = json!({"result": script.ok, "code": script.code});
                if let Some(comment) = &script.comment {
                    status["comment"] = json!(comment);
                }

                let mut element = json!({
                    "requestType": entry.request_type,
                    "requestStatus": status,
                });
                if let Some(id) = &entry.request_id {
                    element["requestId"] = json!(id);
                }
                if script.ok {
                    element["responseData"] = script.rsp;
                }
                results.push(element);

                if batch.halt_on_failure == Some(true) && !script.ok {
                    break;
                }
            }

            stream
                .send(envelope(
                    9,
                    json!({"requestId": batch.request_id, "results": results}),
                ))
                .await?;
        }
    }

    Ok(())
}

#[derive(Debug)]
enum ClientMessage {
    Identify(Identify),
    Reidentify(Reidentify),
    Request(Request),
    RequestBatch(RequestBatch),
}

impl<'de> serde::Deserialize<'de> for ClientMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawMessage {
            op: u8,
            d: Value,
        }

        use serde::de::Error;

        let raw = RawMessage::deserialize(deserializer)?;

        Ok(match raw.op {
            1 => ClientMessage::Identify(serde_json::from_value(raw.d).map_err(D::Error::custom)?),
            3 => {
                ClientMessage::Reidentify(serde_json::from_value(raw.d).map_err(D::Error::custom)?)
            }
            6 => ClientMessage::Request(serde_json::from_value(raw.d).map_err(D::Error::custom)?),
            8 => {
                ClientMessage::RequestBatch(serde_json::from_value(raw.d).map_err(D::Error::custom)?)
            }
            op => return Err(D::Error::custom(format!("unexpected op code {op}"))),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Identify {
    rpc_version: u32,
    authentication: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    event_subscriptions: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct Reidentify {
    event_subscriptions: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Request {
    request_id: String,
    request_type: String,
    #[serde(default)]
    request_data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestBatch {
    request_id: String,
    #[serde(default)]
    halt_on_failure: Option<bool>,
    #[serde(default)]
    #[allow(dead_code)]
    execution_type: Option<i8>,
    requests: Vec<BatchEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchEntry {
    #[serde(default)]
    request_id: Option<String>,
    request_type: String,
    #[serde(default)]
    #[allow(dead_code)]
    request_data: Value,
}
