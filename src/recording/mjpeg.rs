//! Motion JPEG in an AVI (RIFF) container
//!
//! Frames are JPEG-compressed with the `image` crate and appended as `00dc`
//! chunks. Counters and sizes that are only known at the end are written as
//! placeholders and patched when the writer finishes, together with the
//! `idx1` index. A file that was never finished is therefore not playable.
//!
//! A chunk that fails partway through is cut off again, so one failed write
//! never shifts the offsets of the frames after it.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use super::backend::{EncoderBackend, EncoderParams};
use super::config::{BackendStats, EncoderTuning};
use crate::errors::CameraError;
use crate::types::{ConvertedFrame, FrameSize};

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;
const FRAME_CHUNK: &[u8; 4] = b"00dc";

/// Little-endian RIFF builder for the fixed-size header
struct RiffBuf {
    buf: Vec<u8>,
}

impl RiffBuf {
    fn new() -> Self {
        Self { buf: Vec::with_capacity(256) }
    }

    fn fourcc(&mut self, code: &[u8; 4]) {
        self.buf.extend_from_slice(code);
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Reserve a u32 to be filled in later, returning its offset
    fn placeholder(&mut self) -> u64 {
        let at = self.buf.len() as u64;
        self.u32(0);
        at
    }

    /// Open a `LIST` (or `RIFF`) of the given kind; returns the size offset
    fn begin_list(&mut self, id: &[u8; 4], kind: &[u8; 4]) -> usize {
        self.fourcc(id);
        let at = self.buf.len();
        self.u32(0);
        self.fourcc(kind);
        at
    }

    fn begin_chunk(&mut self, id: &[u8; 4]) -> usize {
        self.fourcc(id);
        let at = self.buf.len();
        self.u32(0);
        at
    }

    /// Fill in the size of the list or chunk whose size field is at `at`
    fn end(&mut self, at: usize) {
        let size = (self.buf.len() - at - 4) as u32;
        self.buf[at..at + 4].copy_from_slice(&size.to_le_bytes());
    }
}

/// Header fields patched on finish
struct Patches {
    riff_size: u64,
    total_frames: u64,
    main_buffer_size: u64,
    stream_length: u64,
    stream_buffer_size: u64,
    movi_size: u64,
    /// Offset of the `movi` fourcc; index offsets are relative to it
    movi_start: u64,
}

struct IndexEntry {
    offset: u32,
    size: u32,
}

/// Output that can be cut back to a known length
trait Truncate {
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for BufWriter<File> {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.flush()?;
        self.get_ref().set_len(len)
    }
}

/// Appends whole RIFF chunks. `position` is always the end of the last
/// complete chunk.
struct ChunkWriter<W> {
    sink: W,
    position: u64,
    poisoned: bool,
}

impl<W: Write + Seek + Truncate> ChunkWriter<W> {
    fn new(sink: W, position: u64) -> Self {
        Self {
            sink,
            position,
            poisoned: false,
        }
    }

    fn append(&mut self, id: &[u8; 4], payload: &[u8]) -> Result<(), CameraError> {
        if self.poisoned {
            return Err(CameraError::EncodingError(
                "AVI output is unusable after a failed write".to_string(),
            ));
        }
        let len = u32::try_from(payload.len())
            .map_err(|_| CameraError::EncodingError("chunk exceeds 4 GiB".to_string()))?;

        match self.append_raw(id, len, payload) {
            Ok(written) => {
                self.position += written;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.rollback() {
                    log::error!("Could not remove partial AVI chunk: {}", rollback);
                    self.poisoned = true;
                }
                Err(e.into())
            }
        }
    }

    fn append_raw(&mut self, id: &[u8; 4], len: u32, payload: &[u8]) -> io::Result<u64> {
        self.sink.write_all(id)?;
        self.sink.write_all(&len.to_le_bytes())?;
        self.sink.write_all(payload)?;
        let mut written = 8 + payload.len() as u64;
        if payload.len() % 2 == 1 {
            self.sink.write_all(&[0])?;
            written += 1;
        }
        Ok(written)
    }

    fn rollback(&mut self) -> io::Result<()> {
        self.sink.seek(SeekFrom::Start(self.position))?;
        self.sink.truncate(self.position)
    }

    fn patch(&mut self, offset: u64, value: u32) -> Result<(), CameraError> {
        self.sink.seek(SeekFrom::Start(offset))?;
        self.sink.write_all(&value.to_le_bytes())?;
        Ok(())
    }
}

fn exceeds_avi_limit() -> CameraError {
    CameraError::EncodingError("AVI file exceeds 4 GiB".to_string())
}

/// Motion JPEG AVI writer
pub struct MjpegAviWriter {
    chunks: ChunkWriter<BufWriter<File>>,
    frame_size: FrameSize,
    quality: u8,
    index: Vec<IndexEntry>,
    largest_chunk: u32,
    patches: Patches,
}

impl MjpegAviWriter {
    /// Create the output file and write the AVI header
    pub fn create(params: &EncoderParams, tuning: &EncoderTuning) -> Result<Self, CameraError> {
        let size = params.frame_size;
        if size.is_empty() {
            return Err(CameraError::EncoderInitFailed(format!("invalid frame size {}", size)));
        }
        if !(params.frame_rate.is_finite() && params.frame_rate > 0.0) {
            return Err(CameraError::EncoderInitFailed(format!(
                "invalid frame rate {}",
                params.frame_rate
            )));
        }
        let (width, height) = match (i32::try_from(size.width), i32::try_from(size.height)) {
            (Ok(w), Ok(h)) if w <= i16::MAX as i32 && h <= i16::MAX as i32 => (w, h),
            _ => {
                return Err(CameraError::EncoderInitFailed(format!(
                    "frame size {} exceeds AVI limits",
                    size
                )))
            }
        };

        let file = File::create(&params.path).map_err(|e| {
            CameraError::EncoderInitFailed(format!(
                "Failed to create {}: {}",
                params.path.display(),
                e
            ))
        })?;
        let mut writer = BufWriter::new(file);

        let (header, patches) = build_header(size, width, height, params.frame_rate);
        writer
            .write_all(&header)
            .map_err(|e| CameraError::EncoderInitFailed(format!("Failed to write header: {}", e)))?;

        log::debug!(
            "Opened MJPEG AVI {} ({} @ {:.2} fps, quality {})",
            params.path.display(),
            size,
            params.frame_rate,
            tuning.jpeg_quality
        );

        Ok(Self {
            chunks: ChunkWriter::new(writer, header.len() as u64),
            frame_size: size,
            quality: tuning.jpeg_quality.clamp(1, 100),
            index: Vec::new(),
            largest_chunk: 0,
            patches,
        })
    }
}

impl EncoderBackend for MjpegAviWriter {
    fn write(&mut self, frame: &ConvertedFrame) -> Result<(), CameraError> {
        let rgb = frame.rgb_bytes();
        let mut jpeg = Vec::with_capacity(rgb.len() / 8);
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode(&rgb, self.frame_size.width, self.frame_size.height, ExtendedColorType::Rgb8)
            .map_err(|e| CameraError::EncodingError(format!("JPEG encoding failed: {}", e)))?;

        let offset = u32::try_from(self.chunks.position - self.patches.movi_start)
            .map_err(|_| exceeds_avi_limit())?;
        self.chunks.append(FRAME_CHUNK, &jpeg)?;

        let size = jpeg.len() as u32;
        self.largest_chunk = self.largest_chunk.max(size);
        self.index.push(IndexEntry { offset, size });
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<BackendStats, CameraError> {
        let mut this = *self;
        let movi_size = u32::try_from(this.chunks.position - this.patches.movi_start)
            .map_err(|_| exceeds_avi_limit())?;

        let mut idx = Vec::with_capacity(this.index.len() * 16);
        for entry in &this.index {
            idx.extend_from_slice(FRAME_CHUNK);
            idx.extend_from_slice(&AVIIF_KEYFRAME.to_le_bytes());
            idx.extend_from_slice(&entry.offset.to_le_bytes());
            idx.extend_from_slice(&entry.size.to_le_bytes());
        }
        this.chunks.append(b"idx1", &idx)?;

        let frames = u32::try_from(this.index.len()).map_err(|_| exceeds_avi_limit())?;
        let riff_size = u32::try_from(this.chunks.position - 8).map_err(|_| exceeds_avi_limit())?;
        let largest = this.largest_chunk;
        let p = &this.patches;
        let fields = [
            (p.riff_size, riff_size),
            (p.total_frames, frames),
            (p.main_buffer_size, largest),
            (p.stream_length, frames),
            (p.stream_buffer_size, largest),
            (p.movi_size, movi_size),
        ];
        for (offset, value) in fields {
            this.chunks.patch(offset, value)?;
        }

        this.chunks.sink.flush()?;
        let bytes_written = this.chunks.position;
        let file = this
            .chunks
            .sink
            .into_inner()
            .map_err(|e| CameraError::IoError(format!("Failed to flush AVI: {}", e)))?;
        file.sync_all()?;

        Ok(BackendStats {
            frames: frames as u64,
            skipped: 0,
            bytes_written,
        })
    }
}

fn build_header(size: FrameSize, width: i32, height: i32, fps: f64) -> (Vec<u8>, Patches) {
    let mut h = RiffBuf::new();

    h.fourcc(b"RIFF");
    let riff_size = h.placeholder();
    h.fourcc(b"AVI ");

    let hdrl = h.begin_list(b"LIST", b"hdrl");

    let avih = h.begin_chunk(b"avih");
    h.u32((1_000_000.0 / fps).round() as u32);
    h.u32(0); // max bytes per second
    h.u32(0); // padding granularity
    h.u32(AVIF_HASINDEX);
    let total_frames = h.placeholder();
    h.u32(0); // initial frames
    h.u32(1); // streams
    let main_buffer_size = h.placeholder();
    h.u32(size.width);
    h.u32(size.height);
    for _ in 0..4 {
        h.u32(0);
    }
    h.end(avih);

    let strl = h.begin_list(b"LIST", b"strl");

    let strh = h.begin_chunk(b"strh");
    h.fourcc(b"vids");
    h.fourcc(b"MJPG");
    h.u32(0); // flags
    h.u16(0); // priority
    h.u16(0); // language
    h.u32(0); // initial frames
    h.u32(1000); // scale
    h.u32((fps * 1000.0).round() as u32); // rate
    h.u32(0); // start
    let stream_length = h.placeholder();
    let stream_buffer_size = h.placeholder();
    h.u32(u32::MAX); // quality: driver default
    h.u32(0); // sample size
    h.i16(0);
    h.i16(0);
    h.i16(width as i16);
    h.i16(height as i16);
    h.end(strh);

    let strf = h.begin_chunk(b"strf");
    h.u32(40);
    h.i32(width);
    h.i32(height);
    h.u16(1); // planes
    h.u16(24); // bits per pixel
    h.fourcc(b"MJPG");
    h.u32(size.width * size.height * 3);
    h.i32(0);
    h.i32(0);
    h.u32(0);
    h.u32(0);
    h.end(strf);

    h.end(strl);
    h.end(hdrl);

    h.fourcc(b"LIST");
    let movi_size = h.placeholder();
    let movi_start = h.buf.len() as u64;
    h.fourcc(b"movi");

    let patches = Patches {
        riff_size,
        total_frames,
        main_buffer_size,
        stream_length,
        stream_buffer_size,
        movi_size,
        movi_start,
    };
    (h.buf, patches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::codec::Codec;
    use crate::testing::avi::AviSummary;
    use crate::types::ChannelOrder;

    fn params(path: std::path::PathBuf, width: u32, height: u32) -> EncoderParams {
        EncoderParams {
            path,
            codec: Codec::Mjpg,
            frame_rate: 25.0,
            frame_size: FrameSize::new(width, height),
            is_color: true,
        }
    }

    fn solid(order: ChannelOrder, px: [u8; 3], width: u32, height: u32, sequence: u64) -> ConvertedFrame {
        ConvertedFrame {
            sequence,
            width,
            height,
            order,
            data: px.repeat((width * height) as usize),
        }
    }

    #[test]
    fn test_header_layout() {
        let (header, patches) = build_header(FrameSize::new(64, 48), 64, 48, 25.0);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"AVI ");
        assert_eq!(header.len(), 224);
        assert_eq!(patches.movi_start, 220);
        assert_eq!(&header[220..224], b"movi");
        // avih: 40ms per frame at 25 fps
        assert_eq!(u32::from_le_bytes([header[32], header[33], header[34], header[35]]), 40_000);
    }

    #[test]
    fn test_frames_are_counted_and_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.avi");
        let mut writer = Box::new(MjpegAviWriter::create(&params(path.clone(), 32, 16), &EncoderTuning::default()).unwrap());

        for seq in 0..3 {
            writer
                .write(&solid(ChannelOrder::Rgb, [seq as u8 * 80, 0, 0], 32, 16, seq))
                .unwrap();
        }
        let stats = writer.finish().unwrap();
        assert_eq!(stats.frames, 3);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(stats.bytes_written, bytes.len() as u64);

        let avi = AviSummary::parse(&bytes).unwrap();
        assert_eq!(avi.riff_size as usize, bytes.len() - 8);
        assert_eq!(avi.total_frames, 3);
        assert_eq!(avi.stream_length, 3);
        assert_eq!((avi.width, avi.height), (32, 16));
        assert_eq!(avi.frames.len(), 3);
        assert_eq!(avi.index_entries, 3);
    }

    #[test]
    fn test_bgr_frames_are_stored_as_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.avi");
        let mut writer = Box::new(MjpegAviWriter::create(&params(path.clone(), 16, 16), &EncoderTuning::default()).unwrap());
        writer.write(&solid(ChannelOrder::Bgr, [0, 0, 255], 16, 16, 0)).unwrap();
        writer.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let avi = AviSummary::parse(&bytes).unwrap();
        let img = image::load_from_memory_with_format(&avi.frames[0], image::ImageFormat::Jpeg)
            .unwrap()
            .to_rgb8();
        let px = img.get_pixel(8, 8);
        assert!(px[0] > 230, "red channel {:?}", px);
        assert!(px[1] < 25 && px[2] < 25, "green/blue channels {:?}", px);
    }

    #[test]
    fn test_invalid_params_fail_init() {
        let dir = tempfile::tempdir().unwrap();
        let zero = params(dir.path().join("zero.avi"), 0, 10);
        assert!(matches!(MjpegAviWriter::create(&zero, &EncoderTuning::default()), Err(CameraError::EncoderInitFailed(_))));

        let mut bad_rate = params(dir.path().join("rate.avi"), 16, 16);
        bad_rate.frame_rate = 0.0;
        assert!(matches!(
            MjpegAviWriter::create(&bad_rate, &EncoderTuning::default()),
            Err(CameraError::EncoderInitFailed(_))
        ));
    }

    /// In-memory sink that fails once its byte budget runs out
    struct FlakySink {
        inner: io::Cursor<Vec<u8>>,
        budget: Option<usize>,
        seek_fails: bool,
    }

    impl FlakySink {
        fn new() -> Self {
            Self {
                inner: io::Cursor::new(Vec::new()),
                budget: None,
                seek_fails: false,
            }
        }
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            match self.budget {
                Some(0) => {
                    self.budget = None;
                    Err(io::Error::new(io::ErrorKind::Other, "disk full"))
                }
                Some(left) => {
                    let n = left.min(buf.len());
                    self.budget = Some(left - n);
                    self.inner.write(&buf[..n])
                }
                None => self.inner.write(buf),
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FlakySink {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            if self.seek_fails {
                return Err(io::Error::new(io::ErrorKind::Other, "device gone"));
            }
            self.inner.seek(pos)
        }
    }

    impl Truncate for FlakySink {
        fn truncate(&mut self, len: u64) -> io::Result<()> {
            self.inner.get_mut().truncate(len as usize);
            Ok(())
        }
    }

    fn chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    #[test]
    fn test_partial_chunk_is_removed() {
        let mut chunks = ChunkWriter::new(FlakySink::new(), 0);
        chunks.append(FRAME_CHUNK, &[1; 10]).unwrap();

        // Header and half of the payload reach the sink before it fails
        chunks.sink.budget = Some(8 + 5);
        assert!(matches!(chunks.append(FRAME_CHUNK, &[2; 10]), Err(CameraError::IoError(_))));
        assert_eq!(chunks.position, 18);

        chunks.append(FRAME_CHUNK, &[3; 3]).unwrap();
        assert_eq!(chunks.position, 18 + 12);

        let mut expected = chunk(FRAME_CHUNK, &[1; 10]);
        expected.extend(chunk(FRAME_CHUNK, &[3; 3]));
        assert_eq!(chunks.sink.inner.into_inner(), expected);
    }

    #[test]
    fn test_failed_rollback_refuses_further_writes() {
        let mut chunks = ChunkWriter::new(FlakySink::new(), 0);
        chunks.append(FRAME_CHUNK, &[1; 4]).unwrap();

        chunks.sink.budget = Some(3);
        chunks.sink.seek_fails = true;
        assert!(chunks.append(FRAME_CHUNK, &[2; 4]).is_err());

        chunks.sink.seek_fails = false;
        assert!(matches!(chunks.append(FRAME_CHUNK, &[3; 4]), Err(CameraError::EncodingError(_))));
        assert_eq!(chunks.position, 12);
    }

    #[test]
    fn test_oversized_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = Box::new(
            MjpegAviWriter::create(&params(dir.path().join("big.avi"), 16, 16), &EncoderTuning::default()).unwrap(),
        );
        writer.chunks.position = writer.patches.movi_start + u32::MAX as u64 + 1;

        let frame = solid(ChannelOrder::Rgb, [9, 9, 9], 16, 16, 0);
        assert!(matches!(writer.write(&frame), Err(CameraError::EncodingError(_))));
        assert!(matches!(writer.finish(), Err(CameraError::EncodingError(_))));
    }
}
