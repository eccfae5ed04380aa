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

//! Outbound send queue: FIFO ordering for data frames,
//! with control frames (Close/Ping/Pong) cutting ahead of any frame
//! not yet started.
//!
//! This implementation buffers without bound: `enqueue` always
//! succeeds (short of a frame already being written after Close), and
//! the caller can inspect [`SendQueue::queued_bytes`] to decide for
//! itself whether to apply backpressure upstream.

use std::collections::VecDeque;

use crate::error::WebSocketError;
use crate::frame::{Frame, OpCode};

/// A FIFO queue of outbound frames with control-frame priority.
///
/// Priority only affects where a newly enqueued frame lands relative to
/// other frames still waiting to be written; it never preempts a frame
/// that [`SendQueue::start_next`] has already handed to the writer.
pub struct SendQueue {
  data: VecDeque<Frame>,
  control: VecDeque<Frame>,
  queued_bytes: usize,
  close_enqueued: bool,
}

impl SendQueue {
  pub fn new() -> Self {
    Self {
      data: VecDeque::new(),
      control: VecDeque::new(),
      queued_bytes: 0,
      close_enqueued: false,
    }
  }

  /// Total payload bytes across all frames currently queued (excluding
  /// whatever frame is mid-write, which the caller tracks separately).
  pub fn queued_bytes(&self) -> usize {
    self.queued_bytes
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty() && self.control.is_empty()
  }

  /// Enqueue a frame for sending. Once a Close frame has been enqueued,
  /// any further enqueue attempt fails with `InvalidState`: the
  /// connection is winding down and no more application data may be
  /// scheduled.
  pub fn enqueue(&mut self, frame: Frame) -> Result<(), WebSocketError> {
    if self.close_enqueued {
      return Err(WebSocketError::InvalidState);
    }

    self.queued_bytes += frame.payload.len();
    if frame.opcode.is_control() {
      if frame.opcode == OpCode::Close {
        self.close_enqueued = true;
      }
      self.control.push_back(frame);
    } else {
      self.data.push_back(frame);
    }
    Ok(())
  }

  /// Coalesce a Pong reply: if a Pong is already queued and not yet
  /// being written, replace its payload instead of appending a second
  /// one.
  pub fn enqueue_pong_coalesced(
    &mut self,
    payload: Vec<u8>,
  ) -> Result<(), WebSocketError> {
    if self.close_enqueued {
      return Err(WebSocketError::InvalidState);
    }

    if let Some(existing) = self
      .control
      .iter_mut()
      .find(|f| f.opcode == OpCode::Pong)
    {
      self.queued_bytes -= existing.payload.len();
      self.queued_bytes += payload.len();
      existing.payload = payload;
      return Ok(());
    }

    self.enqueue(Frame::pong(payload))
  }

  /// Pop the next frame to write: control frames drain first.
  pub fn start_next(&mut self) -> Option<Frame> {
    let frame = self.control.pop_front().or_else(|| self.data.pop_front());
    if let Some(ref frame) = frame {
      self.queued_bytes -= frame.payload.len();
    }
    frame
  }
}

impl Default for SendQueue {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn data_frames_drain_fifo() {
    let mut q = SendQueue::new();
    q.enqueue(Frame::text(b"one".to_vec())).unwrap();
    q.enqueue(Frame::text(b"two".to_vec())).unwrap();
    assert_eq!(q.start_next().unwrap().payload, b"one");
    assert_eq!(q.start_next().unwrap().payload, b"two");
    assert!(q.start_next().is_none());
  }

  #[test]
  fn control_frame_cuts_ahead_of_pending_data() {
    let mut q = SendQueue::new();
    q.enqueue(Frame::text(b"data".to_vec())).unwrap();
    q.enqueue(Frame::ping(Vec::new())).unwrap();
    let next = q.start_next().unwrap();
    assert_eq!(next.opcode, OpCode::Ping);
  }

  #[test]
  fn enqueue_after_close_fails() {
    let mut q = SendQueue::new();
    q.enqueue(Frame::close(Some(1000), "")).unwrap();
    let err = q.enqueue(Frame::text(b"too late".to_vec())).unwrap_err();
    assert!(matches!(err, WebSocketError::InvalidState));
  }

  #[test]
  fn pong_coalesces_to_most_recent_payload() {
    let mut q = SendQueue::new();
    q.enqueue_pong_coalesced(vec![1]).unwrap();
    q.enqueue_pong_coalesced(vec![2]).unwrap();
    assert_eq!(q.queued_bytes(), 1);
    let next = q.start_next().unwrap();
    assert_eq!(next.payload, vec![2]);
    assert!(q.start_next().is_none());
  }

  #[test]
  fn queued_bytes_tracks_pending_payloads() {
    let mut q = SendQueue::new();
    assert_eq!(q.queued_bytes(), 0);
    q.enqueue(Frame::binary(vec![0u8; 10])).unwrap();
    assert_eq!(q.queued_bytes(), 10);
    q.start_next();
    assert_eq!(q.queued_bytes(), 0);
  }
}
