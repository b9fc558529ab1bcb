//! Test doubles and generated data
//!
//! Lets the pipeline run end to end without a camera attached: a manually
//! triggered source, an in-memory encoder factory, gradient frames, and a
//! reader for the AVI files the recorder produces.

pub mod avi;
pub mod manual;
pub mod memory;
pub mod synthetic_data;

pub use avi::AviSummary;
pub use manual::{ManualSource, ManualTrigger};
pub use memory::{EncoderEvent, MemoryEncoders};
pub use synthetic_data::{pattern_pixel, synthetic_frame, synthetic_video_frame};
