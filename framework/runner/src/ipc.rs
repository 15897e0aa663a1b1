//! Messages between the multi-process supervisor and its workers.
//!
//! Frames carry a 4 byte little-endian length followed by a JSON payload:
//!
//! ```text
//! +----------------+------------------+
//! | length (4 LE)  | JSON payload     |
//! +----------------+------------------+
//! ```

use std::io::{Read, Write};

use exec_harness_core::prelude::Workload;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Upper bound on a single frame, so a corrupt length prefix cannot exhaust memory.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame too large: {size} bytes (max {max} bytes)")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("End of stream")]
    EndOfStream,
}

/// Supervisor to worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerCommand {
    Run { workload: Workload },
}

/// Worker to supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// The worker has started and read its command. Marks the end of the startup overhead.
    Ready { pid: u32 },
    Done { value: u64, pid: u32 },
    Failed { message: String },
}

pub fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: Write,
    T: Serialize,
{
    let bytes = serde_json::to_vec(message)?;

    let len = bytes.len();
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    writer.write_all(&(len as u32).to_le_bytes())?;
    writer.write_all(&bytes)?;
    writer.flush()?;

    Ok(())
}

pub fn read_frame<R, T>(reader: &mut R) -> Result<T, FrameError>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::EndOfStream);
        }
        Err(e) => return Err(FrameError::Io(e)),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    if len == 0 {
        return Err(FrameError::InvalidFrame("zero-length frame".to_string()));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;

    Ok(serde_json::from_slice(&buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    #[test]
    fn command_survives_the_pipe() {
        let command = WorkerCommand::Run {
            workload: Workload::wait("coffee", Duration::from_millis(250)).unwrap(),
        };

        let mut buf = Vec::new();
        write_frame(&mut buf, &command).unwrap();
        assert_eq!((buf.len() - 4) as u32, u32::from_le_bytes(buf[..4].try_into().unwrap()));

        let decoded: WorkerCommand = read_frame(&mut Cursor::new(buf)).unwrap();
        assert_eq!(command, decoded);
    }

    #[test]
    fn messages_are_read_in_order() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &WorkerMessage::Ready { pid: 7 }).unwrap();
        write_frame(&mut buf, &WorkerMessage::Done { value: 42, pid: 7 }).unwrap();

        let mut reader = Cursor::new(buf);
        let first: WorkerMessage = read_frame(&mut reader).unwrap();
        let second: WorkerMessage = read_frame(&mut reader).unwrap();
        assert_eq!(WorkerMessage::Ready { pid: 7 }, first);
        assert_eq!(WorkerMessage::Done { value: 42, pid: 7 }, second);
        assert!(matches!(
            read_frame::<_, WorkerMessage>(&mut reader),
            Err(FrameError::EndOfStream)
        ));
    }

    #[test]
    fn rejects_oversized_length_prefix() {
        let mut buf = ((MAX_FRAME_SIZE + 1) as u32).to_le_bytes().to_vec();
        buf.extend_from_slice(b"{}");
        assert!(matches!(
            read_frame::<_, WorkerMessage>(&mut Cursor::new(buf)),
            Err(FrameError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn rejects_zero_length_frame() {
        let buf = 0u32.to_le_bytes().to_vec();
        assert!(matches!(
            read_frame::<_, WorkerMessage>(&mut Cursor::new(buf)),
            Err(FrameError::InvalidFrame(_))
        ));
    }

    #[test]
    fn truncated_payload_is_an_io_error() {
        let mut buf = 10u32.to_le_bytes().to_vec();
        buf.extend_from_slice(b"{\"ty");
        assert!(matches!(
            read_frame::<_, WorkerMessage>(&mut Cursor::new(buf)),
            Err(FrameError::Io(_))
        ));
    }

    #[test]
    fn wire_format_is_tagged_json() {
        let json = serde_json::to_value(WorkerMessage::Failed {
            message: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(
            serde_json::json!({"type": "failed", "message": "boom"}),
            json
        );
    }
}
