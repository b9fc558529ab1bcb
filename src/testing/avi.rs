//! Minimal AVI reader for verifying recorded Motion JPEG files

use std::path::Path;

/// The parts of an AVI file the recorder is responsible for
#[derive(Debug, Clone, Default)]
pub struct AviSummary {
    pub riff_size: u32,
    /// `dwTotalFrames` from the main header
    pub total_frames: u32,
    /// `dwLength` from the video stream header
    pub stream_length: u32,
    pub width: u32,
    pub height: u32,
    /// Payloads of the `00dc` chunks, in file order
    pub frames: Vec<Vec<u8>>,
    pub index_entries: usize,
}

impl AviSummary {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
        Self::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"AVI " {
            return Err("not a RIFF AVI file".to_string());
        }
        let mut summary = AviSummary {
            riff_size: le32(bytes, 4)?,
            ..Default::default()
        };
        walk(bytes, 12, bytes.len(), &mut summary)?;
        Ok(summary)
    }
}

fn le32(bytes: &[u8], at: usize) -> Result<u32, String> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| format!("truncated at offset {}", at))
}

fn walk(bytes: &[u8], start: usize, end: usize, summary: &mut AviSummary) -> Result<(), String> {
    let mut pos = start;
    while pos + 8 <= end {
        let id = &bytes[pos..pos + 4];
        let size = le32(bytes, pos + 4)? as usize;
        let body = pos + 8;
        let body_end = body + size;
        if body_end > end {
            return Err(format!("chunk at {} overruns its parent", pos));
        }

        match id {
            b"LIST" => walk(bytes, body + 4, body_end, summary)?,
            b"avih" => {
                summary.total_frames = le32(bytes, body + 16)?;
                summary.width = le32(bytes, body + 32)?;
                summary.height = le32(bytes, body + 36)?;
            }
            b"strh" => summary.stream_length = le32(bytes, body + 32)?,
            b"00dc" => summary.frames.push(bytes[body..body_end].to_vec()),
            b"idx1" => summary.index_entries = size / 16,
            _ => {}
        }

        pos = body_end + (size & 1);
    }
    Ok(())
}
