//! H.264 in MP4: openh264 for encoding, muxide for muxing

use std::fs::File;
use std::io::BufWriter;

use muxide::api::{Metadata, MuxerBuilder, VideoCodec};

use super::backend::{EncoderBackend, EncoderParams};
use super::config::{BackendStats, EncoderTuning};
use super::encoder::H264Encoder;
use crate::errors::CameraError;
use crate::types::ConvertedFrame;

/// MP4 writer that encodes every frame to H.264 and muxes it immediately
pub struct Mp4Writer {
    encoder: H264Encoder,
    muxer: muxide::api::Muxer<BufWriter<File>>,
    frame_count: u64,
    skipped_frames: u64,
    frame_duration_secs: f64,
}

impl Mp4Writer {
    pub fn create(params: &EncoderParams, tuning: &EncoderTuning) -> Result<Self, CameraError> {
        if !(params.frame_rate.is_finite() && params.frame_rate > 0.0) {
            return Err(CameraError::EncoderInitFailed(format!(
                "invalid frame rate {}",
                params.frame_rate
            )));
        }

        // Create the encoder first so an unsupported size never leaves an empty file behind
        let encoder = H264Encoder::with_rate(params.frame_size, tuning.bitrate, params.frame_rate)?;

        let file = File::create(&params.path).map_err(|e| {
            CameraError::EncoderInitFailed(format!(
                "Failed to create {}: {}",
                params.path.display(),
                e
            ))
        })?;
        let writer = BufWriter::new(file);

        let size = params.frame_size;
        let mut metadata = Metadata::new().with_current_time();
        if let Some(ref title) = tuning.title {
            metadata = metadata.with_title(title);
        }

        let muxer = MuxerBuilder::new(writer)
            .video(VideoCodec::H264, size.width, size.height, params.frame_rate)
            .with_fast_start(tuning.fast_start)
            .with_metadata(metadata)
            .build()
            .map_err(|e| CameraError::EncoderInitFailed(format!("Failed to create muxer: {}", e)))?;

        log::debug!(
            "Opened H.264 MP4 {} ({} @ {:.2} fps, {} bps)",
            params.path.display(),
            size,
            params.frame_rate,
            tuning.bitrate
        );

        Ok(Self {
            encoder,
            muxer,
            frame_count: 0,
            skipped_frames: 0,
            frame_duration_secs: 1.0 / params.frame_rate,
        })
    }
}

impl EncoderBackend for Mp4Writer {
    fn write(&mut self, frame: &ConvertedFrame) -> Result<(), CameraError> {
        let encoded = self.encoder.encode_packed(&frame.data, frame.order)?;

        if encoded.data.is_empty() {
            self.skipped_frames += 1;
            return Err(CameraError::EncodingError(format!(
                "encoder produced no output for frame {}",
                frame.sequence
            )));
        }

        let pts = self.frame_count as f64 * self.frame_duration_secs;
        self.muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| CameraError::EncodingError(format!("Failed to write frame: {}", e)))?;

        self.frame_count += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<BackendStats, CameraError> {
        let this = *self;
        let muxer_stats = this
            .muxer
            .finish_with_stats()
            .map_err(|e| CameraError::EncodingError(format!("Failed to finalize recording: {}", e)))?;

        Ok(BackendStats {
            frames: muxer_stats.video_frames,
            skipped: this.skipped_frames,
            bytes_written: muxer_stats.bytes_written,
        })
    }
}
