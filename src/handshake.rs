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

//! Client handshake: build the HTTP Upgrade request and
//! validate the server's response, per RFC 6455 §4.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::ClientConfig;
use crate::error::WebSocketError;
use crate::url::WsUrl;

const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Generate the 16 random bytes for `Sec-WebSocket-Key`, base64-encoded.
pub fn generate_key() -> String {
  let mut key = [0u8; 16];
  rand::rngs::OsRng.fill_bytes(&mut key);
  BASE64.encode(key)
}

fn expected_accept(key: &str) -> String {
  let mut hasher = Sha1::new();
  hasher.update(key.as_bytes());
  hasher.update(GUID.as_bytes());
  BASE64.encode(hasher.finalize())
}

/// Build the literal HTTP/1.1 GET request bytes for the opening
/// handshake.
pub fn build_request(url: &WsUrl, key: &str, config: &ClientConfig) -> Vec<u8> {
  let mut req = String::new();
  req.push_str(&format!("GET {} HTTP/1.1\r\n", url.path_and_query));
  req.push_str(&format!("Host: {}\r\n", url.host_header()));
  req.push_str("Upgrade: websocket\r\n");
  req.push_str("Connection: Upgrade\r\n");
  req.push_str(&format!("Sec-WebSocket-Key: {key}\r\n"));
  req.push_str("Sec-WebSocket-Version: 13\r\n");

  if let Some(origin) = &config.origin {
    req.push_str(&format!("Origin: {origin}\r\n"));
  }

  if !config.protocols.is_empty() {
    req.push_str(&format!(
      "Sec-WebSocket-Protocol: {}\r\n",
      config.protocols.join(", ")
    ));
  }

  if !config.request_cookies.is_empty() {
    let cookie = config
      .request_cookies
      .iter()
      .map(|(name, value)| format!("{name}={value}"))
      .collect::<Vec<_>>()
      .join("; ");
    req.push_str(&format!("Cookie: {cookie}\r\n"));
  }

  for (name, value) in &config.extra_headers {
    req.push_str(&format!("{name}: {value}\r\n"));
  }

  req.push_str("\r\n");
  req.into_bytes()
}

/// The server's parsed handshake response, retained for diagnostics and
/// subprotocol negotiation.
pub struct HandshakeResponse {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub selected_protocol: Option<String>,
}

impl HandshakeResponse {
  fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// Read and parse HTTP response headers up to the terminating CRLFCRLF,
/// returning the response and any bytes read past the header block
/// (which belong to the WebSocket frame stream and must not be
/// discarded).
async fn read_response_headers<S>(
  stream: &mut S,
) -> Result<(String, Vec<u8>), WebSocketError>
where
  S: AsyncRead + Unpin,
{
  let mut buf = Vec::new();
  let mut chunk = [0u8; 512];
  loop {
    if let Some(pos) = find_header_end(&buf) {
      let headers = String::from_utf8_lossy(&buf[..pos]).into_owned();
      let spill = buf[pos + 4..].to_vec();
      return Ok((headers, spill));
    }

    let n = stream.read(&mut chunk).await?;
    if n == 0 {
      return Err(WebSocketError::HandshakeRejected {
        status: None,
        headers: String::from_utf8_lossy(&buf).into_owned(),
      });
    }
    buf.extend_from_slice(&chunk[..n]);
  }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
  buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_response(raw: &str) -> Result<HandshakeResponse, WebSocketError> {
  let mut lines = raw.split("\r\n");
  let status_line = lines.next().unwrap_or("");

  let status = status_line
    .split_whitespace()
    .nth(1)
    .and_then(|s| s.parse::<u16>().ok());

  let mut headers = Vec::new();
  for line in lines {
    if line.is_empty() {
      continue;
    }
    if let Some((name, value)) = line.split_once(':') {
      headers.push((name.trim().to_string(), value.trim().to_string()));
    }
  }

  Ok(HandshakeResponse {
    status: status.unwrap_or(0),
    headers,
    selected_protocol: None,
  })
}

/// Drive the full client handshake over an already-connected stream.
///
/// On success, returns the negotiated subprotocol (if any) plus any
/// bytes read past the header block that belong to the frame stream.
pub async fn client_handshake<S>(
  stream: &mut S,
  url: &WsUrl,
  config: &ClientConfig,
) -> Result<(Option<String>, Vec<u8>), WebSocketError>
where
  S: AsyncRead + AsyncWrite + Unpin,
{
  let key = generate_key();
  let request = build_request(url, &key, config);
  stream.write_all(&request).await?;
  stream.flush().await?;

  let (raw_headers, spill) = read_response_headers(stream).await?;
  let mut response = parse_response(&raw_headers)?;

  let reject = |response: &HandshakeResponse| WebSocketError::HandshakeRejected {
    status: Some(response.status),
    headers: raw_headers_for_error(response, &raw_headers),
  };

  if response.status != 101 {
    return Err(reject(&response));
  }

  let upgrade_ok = response
    .header("upgrade")
    .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
  if !upgrade_ok {
    return Err(reject(&response));
  }

  let connection_ok = response
    .header("connection")
    .is_some_and(|v| {
      v.split(',').any(|tok| tok.trim().eq_ignore_ascii_case("upgrade"))
    });
  if !connection_ok {
    return Err(reject(&response));
  }

  let accept_ok = response
    .header("sec-websocket-accept")
    .is_some_and(|v| v == expected_accept(&key));
  if !accept_ok {
    return Err(reject(&response));
  }

  let selected_protocol = response.header("sec-websocket-protocol").map(str::to_string);
  if let Some(ref proto) = selected_protocol {
    if !config.protocols.is_empty()
      && !config.protocols.iter().any(|p| p == proto)
    {
      return Err(reject(&response));
    }
  }

  response.selected_protocol = selected_protocol.clone();
  Ok((selected_protocol, spill))
}

fn raw_headers_for_error(_response: &HandshakeResponse, raw: &str) -> String {
  raw.to_string()
}
