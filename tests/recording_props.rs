//! Property-based tests for the recording module
//!
//! Run with: cargo test --test recording_props

use proptest::prelude::*;
use tempfile::tempdir;

use crabcapture::recording::{Codec, RecordingSession};
use crabcapture::testing::AviSummary;
use crabcapture::types::{ChannelOrder, ConvertedFrame, FrameSize};

fn gray_frame(sequence: u64, size: FrameSize, order: ChannelOrder) -> ConvertedFrame {
    ConvertedFrame {
        sequence,
        width: size.width,
        height: size.height,
        order,
        data: vec![((sequence * 17) % 256) as u8; size.pixels() * 3],
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CODEC SELECTION
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    /// Only an `.mp4` extension, in any letter case, selects H.264
    #[test]
    fn codec_follows_extension(stem in "[a-z_]{1,12}", ext in "[a-zA-Z0-9]{0,5}") {
        let path = if ext.is_empty() { stem.clone() } else { format!("{}.{}", stem, ext) };
        let expected = if ext.eq_ignore_ascii_case("mp4") { Codec::H264 } else { Codec::Mjpg };
        prop_assert_eq!(Codec::for_path(&path), expected);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MOTION JPEG / AVI
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Header, stream length, movi chunks and index all agree on the frame count
    #[test]
    fn avi_frame_count_matches(
        frame_count in 0u64..20,
        width in 1u32..48,
        height in 1u32..48,
        fps in 1.0f64..60.0,
    ) {
        let dir = tempdir().expect("tempdir");
        let output = dir.path().join("clip.avi");
        let size = FrameSize::new(width, height);

        let mut session = RecordingSession::open(&output, size, fps).expect("open");
        prop_assert_eq!(session.codec(), Codec::Mjpg);
        for i in 0..frame_count {
            session.write(&gray_frame(i, size, ChannelOrder::Bgr)).expect("write");
        }
        let stats = session.close().expect("close").expect("stats");
        prop_assert_eq!(stats.frames_written, frame_count);

        let avi = AviSummary::read(&output).expect("parse avi");
        prop_assert_eq!(avi.total_frames as u64, frame_count);
        prop_assert_eq!(avi.stream_length as u64, frame_count);
        prop_assert_eq!(avi.frames.len() as u64, frame_count);
        prop_assert_eq!(avi.index_entries as u64, frame_count);
        prop_assert_eq!((avi.width, avi.height), (width, height));

        let file_len = std::fs::metadata(&output).expect("metadata").len();
        prop_assert_eq!(avi.riff_size as u64 + 8, file_len);
        prop_assert_eq!(stats.bytes_written, file_len);
    }

    /// Every stored frame is a complete JPEG image
    #[test]
    fn avi_frames_are_jpeg(frame_count in 1u64..6) {
        let dir = tempdir().expect("tempdir");
        let output = dir.path().join("jpeg.avi");
        let size = FrameSize::new(16, 8);

        let mut session = RecordingSession::open(&output, size, 25.0).expect("open");
        for i in 0..frame_count {
            session.write(&gray_frame(i, size, ChannelOrder::Rgb)).expect("write");
        }
        session.close().expect("close");

        let avi = AviSummary::read(&output).expect("parse avi");
        for frame in &avi.frames {
            prop_assert!(frame.starts_with(&[0xFF, 0xD8]), "missing SOI marker");
            prop_assert!(frame.ends_with(&[0xFF, 0xD9]), "missing EOI marker");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// H.264 / MP4
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(feature = "recording")]
mod h264_tests {
    use super::*;
    use crabcapture::recording::H264Encoder;

    proptest! {
        /// Even, non-zero dimensions are accepted
        #[test]
        fn encoder_accepts_even_dimensions(
            width in (1u32..120).prop_map(|w| w * 16),
            height in (1u32..68).prop_map(|h| h * 16),
        ) {
            let result = H264Encoder::new(FrameSize::new(width, height));
            prop_assert!(result.is_ok(), "Encoder should accept {}x{}: {:?}", width, height, result.err());
        }

        /// Odd dimensions cannot be subsampled to 4:2:0
        #[test]
        fn encoder_rejects_odd_dimensions(half_w in 1u32..200, half_h in 1u32..200) {
            let result = H264Encoder::new(FrameSize::new(half_w * 2 + 1, half_h * 2));
            prop_assert!(result.is_err());
        }

        /// Every encoded frame starts with an Annex B start code
        #[test]
        fn encoded_frames_are_annex_b(gray_level in 0u8..255) {
            let size = FrameSize::new(320, 240);
            let mut encoder = H264Encoder::new(size).expect("Encoder creation should succeed");

            let encoded = encoder
                .encode_packed(&vec![gray_level; size.pixels() * 3], ChannelOrder::Rgb)
                .expect("Encoding should succeed");

            if !encoded.data.is_empty() {
                let starts_with_4byte = encoded.data.starts_with(&[0, 0, 0, 1]);
                let starts_with_3byte = encoded.data.starts_with(&[0, 0, 1]);
                prop_assert!(
                    starts_with_4byte || starts_with_3byte,
                    "Encoded frame should start with Annex B prefix, got: {:02x?}",
                    &encoded.data[..encoded.data.len().min(10)]
                );
            }
        }

        /// The first frame is always a keyframe, whatever the channel order
        #[test]
        fn first_frame_is_keyframe(r in 0u8..255, g in 0u8..255, b in 0u8..255, bgr in any::<bool>()) {
            let size = FrameSize::new(320, 240);
            let mut encoder = H264Encoder::new(size).expect("Encoder creation should succeed");

            let pixel = if bgr { [b, g, r] } else { [r, g, b] };
            let order = if bgr { ChannelOrder::Bgr } else { ChannelOrder::Rgb };
            let data: Vec<u8> = pixel.iter().copied().cycle().take(size.pixels() * 3).collect();

            let encoded = encoder.encode_packed(&data, order).expect("Encoding should succeed");
            prop_assert!(encoded.is_keyframe, "First frame must be a keyframe");
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// Every frame handed to an MP4 session is muxed; none are skipped
        #[test]
        fn mp4_frame_count_matches(frame_count in 1u64..20) {
            let dir = tempdir().expect("tempdir");
            let output = dir.path().join("clip.mp4");
            let size = FrameSize::new(320, 240);

            let mut session = RecordingSession::open(&output, size, 30.0).expect("open");
            prop_assert_eq!(session.codec(), Codec::H264);
            for i in 0..frame_count {
                session.write(&gray_frame(i, size, ChannelOrder::Bgr)).expect("write");
            }
            let stats = session.close().expect("close").expect("stats");

            prop_assert_eq!(stats.frames_written, frame_count);
            prop_assert_eq!(stats.skipped_frames, 0);
            prop_assert!(stats.bytes_written > 0);
            prop_assert!(output.exists());
        }
    }
}
