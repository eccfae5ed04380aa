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

//! Connects to a WebSocket echo server, sends one line per argument (or
//! "hello" if none given), and prints whatever comes back.
//!
//! Run against e.g. `wss://echo.websocket.events`:
//!
//! ```text
//! cargo run --example echo_client -- "hello there"
//! ```

use anyhow::Result;
use tokio::sync::mpsc;
use wsrocket::{connect, AssembledMessage, ClientConfig, WebSocketDelegate, WebSocketError};

struct PrintingDelegate {
  done: mpsc::UnboundedSender<()>,
}

impl WebSocketDelegate for PrintingDelegate {
  fn did_open(&mut self, selected_protocol: Option<&str>) {
    tracing::info!(?selected_protocol, "connection open");
  }

  fn did_receive_message(&mut self, message: AssembledMessage) {
    match message {
      AssembledMessage::Text(text) => println!("received: {text}"),
      AssembledMessage::Binary(data) => println!("received {} binary bytes", data.len()),
    }
    let _ = self.done.send(());
  }

  fn did_fail(&mut self, error: &WebSocketError) {
    tracing::warn!(%error, "connection failed");
  }

  fn did_close(&mut self, code: Option<wsrocket::CloseCode>, reason: &str, was_clean: bool) {
    tracing::info!(?code, reason, was_clean, "connection closed");
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let url = "wss://echo.websocket.events";
  let message = std::env::args().nth(1).unwrap_or_else(|| "hello".into());

  let (tx, mut rx) = mpsc::unbounded_channel();
  let delegate = PrintingDelegate { done: tx };
  let conn = connect(url, ClientConfig::default(), delegate).await?;

  conn.send_text(message)?;
  rx.recv().await;

  conn.close(1000, "done")?;
  Ok(())
}
