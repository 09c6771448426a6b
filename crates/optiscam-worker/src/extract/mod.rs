//! Signal extractors that turn frames and audio into timestamped detections.

pub mod audio;
pub mod text;

pub use audio::AudioSignalExtractor;
pub use text::TextSignalExtractor;
