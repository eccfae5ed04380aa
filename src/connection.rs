// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Connection state machine and driver task: the single-logical-actor
//! that owns the assembler, send queue and `ReadyState`, and the
//! read/write halves it `select!`s between.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::assembler::{AssembledMessage, MessageAssembler};
use crate::close::CloseCode;
use crate::config::ClientConfig;
use crate::delegate::WebSocketDelegate;
use crate::error::WebSocketError;
use crate::frame::{decode, Decoded, Frame, OpCode};
use crate::sendqueue::SendQueue;
use crate::transport::Transport;

/// The connection's lifecycle state. Transitions are one-way:
/// `Connecting` → `Open` → `Closing` → `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
  Connecting,
  Open,
  Closing,
  Closed,
}

/// A request to send, submitted from outside the driver task.
enum Command {
  SendText(String),
  SendBinary(Vec<u8>),
  SendPing(Vec<u8>),
  Close(Option<u16>, String),
}

/// A handle to an open WebSocket connection, backed by a driver task.
/// Cloning is cheap; every clone shares the same outbound channel.
#[derive(Clone)]
pub struct Connection {
  commands: mpsc::UnboundedSender<Command>,
}

impl Connection {
  pub fn send_text(&self, text: impl Into<String>) -> Result<(), WebSocketError> {
    self
      .commands
      .send(Command::SendText(text.into()))
      .map_err(|_| WebSocketError::ConnectionClosed)
  }

  pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<(), WebSocketError> {
    self
      .commands
      .send(Command::SendBinary(data.into()))
      .map_err(|_| WebSocketError::ConnectionClosed)
  }

  pub fn send_ping(&self, payload: impl Into<Vec<u8>>) -> Result<(), WebSocketError> {
    self
      .commands
      .send(Command::SendPing(payload.into()))
      .map_err(|_| WebSocketError::ConnectionClosed)
  }

  pub fn close(&self, code: u16, reason: impl Into<String>) -> Result<(), WebSocketError> {
    self
      .commands
      .send(Command::Close(Some(code), reason.into()))
      .map_err(|_| WebSocketError::ConnectionClosed)
  }
}

struct Driver<S, D> {
  transport: S,
  delegate: D,
  config: ClientConfig,
  state: ReadyState,
  assembler: MessageAssembler,
  send_queue: SendQueue,
  /// Set once the peer's Close frame has been decoded while still
  /// `Open`, carrying the app-facing (not wire-echoed) code and reason
  /// to report once our echoing Close frame finishes writing.
  pending_close_report: Option<(Option<CloseCode>, String)>,
  remote_close_seen: bool,
}

/// Drive a connection to completion on a freshly spawned task, given a
/// transport that has already completed the opening handshake. `spill`
/// is any bytes the handshake read past the response header block,
/// which already belong to the frame stream. Returns a handle the
/// caller uses to submit outbound messages.
pub fn spawn<S, D>(
  transport: S,
  config: ClientConfig,
  mut delegate: D,
  selected_protocol: Option<String>,
  spill: Vec<u8>,
) -> Connection
where
  S: Transport + 'static,
  D: WebSocketDelegate + 'static,
{
  let (tx, rx) = mpsc::unbounded_channel();
  delegate.did_open(selected_protocol.as_deref());

  let assembler = MessageAssembler::new(config.max_inbound_payload);
  let driver = Driver {
    transport,
    delegate,
    config,
    state: ReadyState::Open,
    assembler,
    send_queue: SendQueue::new(),
    pending_close_report: None,
    remote_close_seen: false,
  };

  tokio::spawn(run_driver(driver, rx, spill));
  Connection { commands: tx }
}

async fn run_driver<S, D>(
  mut driver: Driver<S, D>,
  mut commands: mpsc::UnboundedReceiver<Command>,
  mut read_buf: Vec<u8>,
) where
  S: Transport,
  D: WebSocketDelegate,
{
  if !read_buf.is_empty() {
    if let Err(err) = driver.drain_frames(&mut read_buf) {
      driver.fail(err).await;
    }
  }
  let mut chunk = [0u8; 4096];

  loop {
    if driver.state == ReadyState::Closed {
      break;
    }

    tokio::select! {
      biased;

      command = commands.recv(), if driver.state == ReadyState::Open => {
        match command {
          Some(Command::SendText(text)) => {
            if let Err(err) = driver.send_queue.enqueue(Frame::text(text.into_bytes())) {
              warn!(?err, "dropping send on a connection that is already closing");
            }
          }
          Some(Command::SendBinary(data)) => {
            if let Err(err) = driver.send_queue.enqueue(Frame::binary(data)) {
              warn!(?err, "dropping send on a connection that is already closing");
            }
          }
          Some(Command::SendPing(payload)) => {
            if let Err(err) = driver.send_queue.enqueue(Frame::ping(payload)) {
              warn!(?err, "dropping ping on a connection that is already closing");
            }
          }
          Some(Command::Close(code, reason)) => {
            driver.begin_local_close(code, reason);
          }
          None => {
            driver.begin_local_close(Some(CloseCode::GOING_AWAY.0), String::new());
          }
        }
      }

      result = driver.transport.read(&mut chunk) => {
        match result {
          Ok(0) => {
            driver.transition_closed(Some(CloseCode::ABNORMAL), "", false);
          }
          Ok(n) => {
            read_buf.extend_from_slice(&chunk[..n]);
            if let Err(err) = driver.drain_frames(&mut read_buf) {
              driver.fail(err).await;
            }
          }
          Err(err) => {
            driver.fail(WebSocketError::Io(err)).await;
          }
        }
      }

      _ = sleep(driver.config.close_timeout), if driver.state == ReadyState::Closing => {
        warn!("close timer expired waiting for peer's close frame");
        driver.transition_closed(Some(CloseCode::ABNORMAL), "", false);
      }
    }

    if let Err(err) = driver.flush_sends().await {
      driver.fail(err).await;
    }
  }

  trace!("driver task exiting");
}

impl<S, D> Driver<S, D>
where
  S: Transport,
  D: WebSocketDelegate,
{
  fn begin_local_close(&mut self, code: Option<u16>, reason: String) {
    if self.state != ReadyState::Open {
      return;
    }
    self.state = ReadyState::Closing;
    let _ = self.send_queue.enqueue(Frame::close(code, &reason));
  }

  fn drain_frames(&mut self, buf: &mut Vec<u8>) -> Result<(), WebSocketError> {
    loop {
      match decode(buf, self.config.max_inbound_payload)? {
        Decoded::NeedMore(_) => return Ok(()),
        Decoded::Frame { frame, consumed } => {
          buf.drain(..consumed);
          self.handle_frame(frame)?;
        }
      }
    }
  }

  fn handle_frame(&mut self, frame: Frame) -> Result<(), WebSocketError> {
    match frame.opcode {
      OpCode::Ping => {
        self.send_queue.enqueue_pong_coalesced(frame.payload)?;
      }
      OpCode::Pong => {
        self.delegate.did_receive_pong(&frame.payload);
      }
      OpCode::Close => {
        self.handle_close_frame(frame.payload)?;
      }
      OpCode::Text | OpCode::Binary | OpCode::Continuation => {
        if let Some(message) = self.assembler.push(frame)? {
          self.deliver(message);
        }
      }
    }
    Ok(())
  }

  fn deliver(&mut self, message: AssembledMessage) {
    let message = match (message, self.config.deliver_text_as_binary) {
      (AssembledMessage::Text(text), true) => AssembledMessage::Binary(text.into_bytes()),
      (other, _) => other,
    };
    self.delegate.did_receive_message(message);
  }

  fn handle_close_frame(&mut self, payload: Vec<u8>) -> Result<(), WebSocketError> {
    let (code, reason) = parse_close_payload(&payload)?;
    self.remote_close_seen = true;
    // A Close frame with no code is reported to the delegate as 1005,
    // distinct from the code we choose to echo back on the wire.
    let report_code = Some(code.unwrap_or(CloseCode::NO_STATUS));

    match self.state {
      ReadyState::Open => {
        // Echo the peer's code back (or 1000 if it sent none). The
        // actual Closed transition happens once that echo is written,
        // in flush_sends.
        let echo_code = code.map(|c| c.0).unwrap_or(CloseCode::NORMAL.0);
        self.pending_close_report = Some((report_code, reason.clone()));
        let _ = self
          .send_queue
          .enqueue(Frame::close(Some(echo_code), &reason));
        self.state = ReadyState::Closing;
      }
      ReadyState::Closing => {
        self.transition_closed(report_code, &reason, true);
      }
      _ => {}
    }
    Ok(())
  }

  fn transition_closed(&mut self, code: Option<CloseCode>, reason: &str, was_clean: bool) {
    if self.state == ReadyState::Closed {
      return;
    }
    self.state = ReadyState::Closed;
    debug!(?code, was_clean, "connection closed");
    self.delegate.did_close(code, reason, was_clean);
  }

  /// Handle a fatal error: send a Close handshake carrying the error's
  /// designated code when wire state still permits it, then notify the
  /// delegate. Transport failures have no WebSocket-level code to send
  /// and close directly with 1006.
  async fn fail(&mut self, err: WebSocketError) {
    if self.state == ReadyState::Closed {
      return;
    }

    let code = err.close_code();
    if self.state == ReadyState::Open {
      if let Some(code) = code {
        let _ = self.send_queue.enqueue(Frame::close(Some(code.0), ""));
        while let Some(frame) = self.send_queue.start_next() {
          if self.transport.write_all(&frame.encode_masked()).await.is_err() {
            break;
          }
        }
      }
    }

    self.delegate.did_fail(&err);
    let final_code = if err.is_transport_failure() {
      Some(CloseCode::ABNORMAL)
    } else {
      code
    };
    self.transition_closed(final_code, "", false);
  }

  async fn flush_sends(&mut self) -> Result<(), WebSocketError> {
    while let Some(frame) = self.send_queue.start_next() {
      let is_close = frame.opcode == OpCode::Close;
      self.transport.write_all(&frame.encode_masked()).await?;
      if is_close && self.remote_close_seen {
        if let Some((code, reason)) = self.pending_close_report.take() {
          self.transition_closed(code, &reason, true);
        }
      }
    }
    self.transport.flush().await?;
    Ok(())
  }
}

fn parse_close_payload(
  payload: &[u8],
) -> Result<(Option<CloseCode>, String), WebSocketError> {
  if payload.is_empty() {
    return Ok((None, String::new()));
  }
  if payload.len() == 1 {
    return Err(WebSocketError::ProtocolViolation(
      "close frame payload of exactly one byte",
    ));
  }

  let code = u16::from_be_bytes([payload[0], payload[1]]);
  let close_code = CloseCode(code);
  if !close_code.is_allowed_on_wire() {
    return Err(WebSocketError::InvalidCloseCode(code));
  }

  let reason_bytes = &payload[2..];
  if !crate::utf8::validate_complete(reason_bytes) {
    return Err(WebSocketError::Utf8Violation);
  }
  let reason = String::from_utf8(reason_bytes.to_vec()).expect("validated above");

  Ok((Some(close_code), reason))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
  use tokio::time::{timeout, Duration};

  #[derive(Debug)]
  enum Event {
    Open(Option<String>),
    Message(AssembledMessage),
    Pong(Vec<u8>),
    Fail(String),
    Close(Option<CloseCode>, String, bool),
  }

  struct RecordingDelegate {
    tx: mpsc::UnboundedSender<Event>,
  }

  impl WebSocketDelegate for RecordingDelegate {
    fn did_receive_message(&mut self, message: AssembledMessage) {
      let _ = self.tx.send(Event::Message(message));
    }

    fn did_open(&mut self, selected_protocol: Option<&str>) {
      let _ = self.tx.send(Event::Open(selected_protocol.map(str::to_string)));
    }

    fn did_receive_pong(&mut self, payload: &[u8]) {
      let _ = self.tx.send(Event::Pong(payload.to_vec()));
    }

    fn did_fail(&mut self, error: &WebSocketError) {
      let _ = self.tx.send(Event::Fail(error.to_string()));
    }

    fn did_close(&mut self, code: Option<CloseCode>, reason: &str, was_clean: bool) {
      let _ = self.tx.send(Event::Close(code, reason.to_string(), was_clean));
    }
  }

  async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(Duration::from_secs(1), rx.recv())
      .await
      .expect("event arrives within timeout")
      .expect("channel stays open")
  }

  fn spawn_test_connection() -> (
    Connection,
    mpsc::UnboundedReceiver<Event>,
    tokio::io::DuplexStream,
  ) {
    let (client, server) = tokio::io::duplex(8192);
    let (tx, rx) = mpsc::unbounded_channel();
    let delegate = RecordingDelegate { tx };
    let handle = spawn(client, ClientConfig::default(), delegate, None, Vec::new());
    (handle, rx, server)
  }

  #[tokio::test]
  async fn echo_text_round_trip() {
    let (conn, mut events, mut server) = spawn_test_connection();
    assert!(matches!(next_event(&mut events).await, Event::Open(None)));

    conn.send_text("Hello").unwrap();

    let mut buf = [0u8; 256];
    let n = server.read(&mut buf).await.unwrap();
    let frame = match decode(&buf[..n], u64::MAX).unwrap() {
      Decoded::Frame { frame, .. } => frame,
      _ => panic!("expected a complete frame"),
    };
    assert_eq!(frame.opcode, OpCode::Text);
    assert_eq!(frame.payload, b"Hello");

    server.write_all(&frame.encode_unmasked()).await.unwrap();
    match next_event(&mut events).await {
      Event::Message(AssembledMessage::Text(text)) => assert_eq!(text, "Hello"),
      other => panic!("unexpected event: {other:?}"),
    }
  }

  #[tokio::test]
  async fn fragmented_text_reassembles_into_one_message() {
    let (_conn, mut events, mut server) = spawn_test_connection();
    assert!(matches!(next_event(&mut events).await, Event::Open(None)));

    server
      .write_all(&Frame::new(false, OpCode::Text, b"Hel".to_vec()).encode_unmasked())
      .await
      .unwrap();
    server
      .write_all(
        &Frame::new(false, OpCode::Continuation, b"lo, ".to_vec())
          .encode_unmasked(),
      )
      .await
      .unwrap();
    server
      .write_all(
        &Frame::new(true, OpCode::Continuation, b"world".to_vec())
          .encode_unmasked(),
      )
      .await
      .unwrap();

    match next_event(&mut events).await {
      Event::Message(AssembledMessage::Text(text)) => {
        assert_eq!(text, "Hello, world")
      }
      other => panic!("unexpected event: {other:?}"),
    }
  }

  #[tokio::test]
  async fn ping_with_payload_gets_matching_pong() {
    let (_conn, mut events, mut server) = spawn_test_connection();
    assert!(matches!(next_event(&mut events).await, Event::Open(None)));

    let ping_payload = vec![0xDE, 0xAD, 0xBE, 0xEF];
    server
      .write_all(&Frame::ping(ping_payload.clone()).encode_unmasked())
      .await
      .unwrap();

    let mut buf = [0u8; 256];
    let n = server.read(&mut buf).await.unwrap();
    let frame = match decode(&buf[..n], u64::MAX).unwrap() {
      Decoded::Frame { frame, .. } => frame,
      _ => panic!("expected a complete frame"),
    };
    assert_eq!(frame.opcode, OpCode::Pong);
    assert_eq!(frame.payload, ping_payload);
  }

  #[tokio::test]
  async fn invalid_utf8_text_closes_with_1007() {
    let (_conn, mut events, mut server) = spawn_test_connection();
    assert!(matches!(next_event(&mut events).await, Event::Open(None)));

    server
      .write_all(&Frame::text(vec![0xc0, 0xaf]).encode_unmasked())
      .await
      .unwrap();

    assert!(matches!(next_event(&mut events).await, Event::Fail(_)));
    match next_event(&mut events).await {
      Event::Close(Some(code), _, was_clean) => {
        assert_eq!(code, CloseCode::INVALID_PAYLOAD);
        assert!(!was_clean);
      }
      other => panic!("unexpected event: {other:?}"),
    }
  }

  #[tokio::test]
  async fn oversized_frame_closes_with_1009() {
    let (client, server_raw) = tokio::io::duplex(1 << 16);
    let (tx, mut events) = mpsc::unbounded_channel();
    let delegate = RecordingDelegate { tx };
    let config = ClientConfig::default().with_max_inbound_payload(1024);
    let _conn = spawn(client, config, delegate, None, Vec::new());
    let mut server = server_raw;

    assert!(matches!(next_event(&mut events).await, Event::Open(None)));

    server
      .write_all(&Frame::binary(vec![0u8; 2048]).encode_unmasked())
      .await
      .unwrap();

    assert!(matches!(next_event(&mut events).await, Event::Fail(_)));
    match next_event(&mut events).await {
      Event::Close(Some(code), _, was_clean) => {
        assert_eq!(code, CloseCode::MESSAGE_TOO_BIG);
        assert!(!was_clean);
      }
      other => panic!("unexpected event: {other:?}"),
    }
  }

  #[tokio::test]
  async fn close_payload_of_one_byte_is_protocol_error() {
    let (_conn, mut events, mut server) = spawn_test_connection();
    assert!(matches!(next_event(&mut events).await, Event::Open(None)));

    server
      .write_all(&Frame::new(true, OpCode::Close, vec![0x03]).encode_unmasked())
      .await
      .unwrap();

    assert!(matches!(next_event(&mut events).await, Event::Fail(_)));
    match next_event(&mut events).await {
      Event::Close(Some(code), _, was_clean) => {
        assert_eq!(code, CloseCode::PROTOCOL_ERROR);
        assert!(!was_clean);
      }
      other => panic!("unexpected event: {other:?}"),
    }
  }

  #[tokio::test]
  async fn clean_close_reports_1000_and_was_clean_true() {
    let (conn, mut events, mut server) = spawn_test_connection();
    assert!(matches!(next_event(&mut events).await, Event::Open(None)));

    conn.close(1000, "").unwrap();

    let mut buf = [0u8; 256];
    let n = server.read(&mut buf).await.unwrap();
    let frame = match decode(&buf[..n], u64::MAX).unwrap() {
      Decoded::Frame { frame, .. } => frame,
      _ => panic!("expected a complete frame"),
    };
    assert_eq!(frame.opcode, OpCode::Close);

    server
      .write_all(&Frame::close(Some(1000), "").encode_unmasked())
      .await
      .unwrap();

    match next_event(&mut events).await {
      Event::Close(Some(code), reason, was_clean) => {
        assert_eq!(code, CloseCode::NORMAL);
        assert_eq!(reason, "");
        assert!(was_clean);
      }
      other => panic!("unexpected event: {other:?}"),
    }
  }

  #[tokio::test]
  async fn close_with_no_payload_reports_no_status() {
    let (_conn, mut events, mut server) = spawn_test_connection();
    assert!(matches!(next_event(&mut events).await, Event::Open(None)));

    server
      .write_all(&Frame::new(true, OpCode::Close, Vec::new()).encode_unmasked())
      .await
      .unwrap();

    match next_event(&mut events).await {
      Event::Close(Some(code), _, was_clean) => {
        assert_eq!(code, CloseCode::NO_STATUS);
        assert!(was_clean);
      }
      other => panic!("unexpected event: {other:?}"),
    }
  }

  #[tokio::test]
  async fn transport_drop_without_close_frame_reports_abnormal() {
    let (_conn, mut events, server) = spawn_test_connection();
    assert!(matches!(next_event(&mut events).await, Event::Open(None)));

    drop(server);

    match next_event(&mut events).await {
      Event::Close(Some(code), _, was_clean) => {
        assert_eq!(code, CloseCode::ABNORMAL);
        assert!(!was_clean);
      }
      other => panic!("unexpected event: {other:?}"),
    }
  }
}
