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

//! Message assembler: joins continuation frames into
//! complete messages and enforces RFC 6455 §5.4 fragmentation rules.

use crate::error::WebSocketError;
use crate::frame::{Frame, OpCode};
use crate::utf8::{Utf8Status, Utf8Validator};

/// A fully reassembled message, ready for delivery to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembledMessage {
  Text(String),
  Binary(Vec<u8>),
}

enum AssemblyState {
  Idle,
  Assembling {
    opcode: OpCode,
    buffer: Vec<u8>,
    validator: Option<Utf8Validator>,
  },
}

/// Reassembles fragmented WebSocket messages, one at a time.
///
/// Control frames (Close/Ping/Pong) never touch this state; the caller is
/// expected to handle them before reaching the assembler.
pub struct MessageAssembler {
  state: AssemblyState,
  max_message_size: u64,
}

impl MessageAssembler {
  pub fn new(max_message_size: u64) -> Self {
    Self {
      state: AssemblyState::Idle,
      max_message_size,
    }
  }

  pub fn is_assembling(&self) -> bool {
    matches!(self.state, AssemblyState::Assembling { .. })
  }

  /// Feed one data frame (Text, Binary or Continuation) into the
  /// assembler. Returns `Some(message)` once a `fin=1` frame completes
  /// the message, `None` while more fragments are still expected.
  pub fn push(
    &mut self,
    frame: Frame,
  ) -> Result<Option<AssembledMessage>, WebSocketError> {
    debug_assert!(!frame.opcode.is_control());

    match &mut self.state {
      AssemblyState::Idle => {
        if frame.opcode == OpCode::Continuation {
          return Err(WebSocketError::ProtocolViolation(
            "continuation frame with no message in progress",
          ));
        }

        let validator = if frame.opcode == OpCode::Text {
          let mut v = Utf8Validator::new();
          if v.feed(&frame.payload) == Utf8Status::Invalid {
            return Err(WebSocketError::Utf8Violation);
          }
          Some(v)
        } else {
          None
        };

        if frame.fin {
          return Ok(Some(self.finish(frame.opcode, frame.payload, validator)?));
        }

        let size = frame.payload.len() as u64;
        self.state = AssemblyState::Assembling {
          opcode: frame.opcode,
          buffer: frame.payload,
          validator,
        };
        self.check_size(size)?;
        Ok(None)
      }
      AssemblyState::Assembling {
        opcode,
        buffer,
        validator,
      } => {
        if frame.opcode != OpCode::Continuation {
          return Err(WebSocketError::ProtocolViolation(
            "expected a continuation frame while a message is being assembled",
          ));
        }

        if let Some(v) = validator {
          if v.feed(&frame.payload) == Utf8Status::Invalid {
            return Err(WebSocketError::Utf8Violation);
          }
        }

        buffer.extend_from_slice(&frame.payload);
        let size = buffer.len() as u64;
        let done = frame.fin;
        let opcode = *opcode;

        if done {
          let AssemblyState::Assembling {
            buffer, validator, ..
          } = std::mem::replace(&mut self.state, AssemblyState::Idle)
          else {
            unreachable!()
          };
          return Ok(Some(self.finish(opcode, buffer, validator)?));
        }

        self.check_size(size)?;
        Ok(None)
      }
    }
  }

  fn check_size(&mut self, size: u64) -> Result<(), WebSocketError> {
    if size > self.max_message_size {
      self.state = AssemblyState::Idle;
      return Err(WebSocketError::PayloadTooLarge {
        size,
        max: self.max_message_size,
      });
    }
    Ok(())
  }

  fn finish(
    &self,
    opcode: OpCode,
    payload: Vec<u8>,
    validator: Option<Utf8Validator>,
  ) -> Result<AssembledMessage, WebSocketError> {
    match opcode {
      OpCode::Text => {
        let valid_terminal =
          validator.map(|v| v.is_valid_terminal()).unwrap_or(true);
        if !valid_terminal {
          return Err(WebSocketError::Utf8Violation);
        }
        let text = String::from_utf8(payload)
          .map_err(|_| WebSocketError::Utf8Violation)?;
        Ok(AssembledMessage::Text(text))
      }
      OpCode::Binary => Ok(AssembledMessage::Binary(payload)),
      _ => unreachable!("assembler only ever stores Text or Binary opcodes"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn single_frame_text_message() {
    let mut a = MessageAssembler::new(u64::MAX);
    let msg = a.push(Frame::text(b"Hello".to_vec())).unwrap().unwrap();
    assert_eq!(msg, AssembledMessage::Text("Hello".into()));
    assert!(!a.is_assembling());
  }

  #[test]
  fn fragmented_text_message_reassembles_in_order() {
    let mut a = MessageAssembler::new(u64::MAX);
    assert!(a
      .push(Frame::new(false, OpCode::Text, b"Hel".to_vec()))
      .unwrap()
      .is_none());
    assert!(a.is_assembling());
    assert!(a
      .push(Frame::new(false, OpCode::Continuation, b"lo, ".to_vec()))
      .unwrap()
      .is_none());
    let msg = a
      .push(Frame::new(true, OpCode::Continuation, b"world".to_vec()))
      .unwrap()
      .unwrap();
    assert_eq!(msg, AssembledMessage::Text("Hello, world".into()));
  }

  #[test]
  fn binary_completion_delivers_opaque_bytes() {
    let mut a = MessageAssembler::new(u64::MAX);
    let msg = a
      .push(Frame::binary(vec![1, 2, 3, 4]))
      .unwrap()
      .unwrap();
    assert_eq!(msg, AssembledMessage::Binary(vec![1, 2, 3, 4]));
  }

  #[test]
  fn continuation_without_start_fails() {
    let mut a = MessageAssembler::new(u64::MAX);
    let err = a
      .push(Frame::new(true, OpCode::Continuation, b"oops".to_vec()))
      .unwrap_err();
    assert!(matches!(err, WebSocketError::ProtocolViolation(_)));
  }

  #[test]
  fn new_data_frame_mid_assembly_fails() {
    let mut a = MessageAssembler::new(u64::MAX);
    a.push(Frame::new(false, OpCode::Text, b"Hel".to_vec()))
      .unwrap();
    let err = a
      .push(Frame::new(true, OpCode::Binary, b"oops".to_vec()))
      .unwrap_err();
    assert!(matches!(err, WebSocketError::ProtocolViolation(_)));
  }

  #[test]
  fn invalid_utf8_on_single_frame_fails() {
    let mut a = MessageAssembler::new(u64::MAX);
    let err = a
      .push(Frame::text(vec![0xc0, 0xaf]))
      .unwrap_err();
    assert!(matches!(err, WebSocketError::Utf8Violation));
  }

  #[test]
  fn invalid_utf8_split_across_fragments_fails_at_terminal() {
    let mut a = MessageAssembler::new(u64::MAX);
    a.push(Frame::new(false, OpCode::Text, vec![0xc0]))
      .unwrap();
    let err = a
      .push(Frame::new(true, OpCode::Continuation, vec![0xaf]))
      .unwrap_err();
    assert!(matches!(err, WebSocketError::Utf8Violation));
  }

  #[test]
  fn valid_utf8_split_across_fragment_boundary_succeeds() {
    let mut a = MessageAssembler::new(u64::MAX);
    // U+1F389 split across two fragments.
    a.push(Frame::new(false, OpCode::Text, vec![0xf0, 0x9f]))
      .unwrap();
    let msg = a
      .push(Frame::new(true, OpCode::Continuation, vec![0x8e, 0x89]))
      .unwrap()
      .unwrap();
    assert_eq!(msg, AssembledMessage::Text("\u{1F389}".into()));
  }

  #[test]
  fn oversized_message_fails() {
    let mut a = MessageAssembler::new(4);
    let err = a.push(Frame::binary(vec![0u8; 5])).unwrap_err();
    assert!(matches!(err, WebSocketError::PayloadTooLarge { .. }));
  }

  #[test]
  fn oversized_message_across_fragments_fails() {
    let mut a = MessageAssembler::new(4);
    a.push(Frame::new(false, OpCode::Binary, vec![1, 2]))
      .unwrap();
    let err = a
      .push(Frame::new(true, OpCode::Continuation, vec![3, 4, 5]))
      .unwrap_err();
    assert!(matches!(err, WebSocketError::PayloadTooLarge { .. }));
  }
}
