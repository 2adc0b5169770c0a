use std::io;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::wire::{EvalReply, EvalRequest};

/// Upper bound on a single frame. A worker that streams this much without a
/// newline is treated as corrupt rather than buffered without limit.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Newline-delimited JSON codec for the worker channel.
///
/// Encodes [`EvalRequest`] frames and decodes [`EvalReply`] frames. Blank
/// lines are skipped; anything else that fails to parse is an
/// `InvalidData` error, which the session treats as a closed transport.
#[derive(Debug, Default)]
pub struct EvalCodec {
    /// Scan position for the next newline search, so partial reads are not
    /// rescanned from the start.
    next_index: usize,
}

impl EvalCodec {
    pub fn new() -> Self {
        Self { next_index: 0 }
    }
}

impl Encoder<EvalRequest> for EvalCodec {
    type Error = io::Error;

    fn encode(&mut self, item: EvalRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item).map_err(io::Error::other)?;
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}

impl Decoder for EvalCodec {
    type Item = EvalReply;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > MAX_FRAME_LEN {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("frame exceeds {MAX_FRAME_LEN} bytes without a newline"),
                    ));
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let end = self.next_index + offset;
            let frame = src.split_to(end + 1);
            self.next_index = 0;

            let line = &frame[..frame.len() - 1];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                continue;
            }

            let reply = serde_json::from_slice(line)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            return Ok(Some(reply));
        }
    }
}
