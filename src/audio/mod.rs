#[cfg(feature = "audio-io")]
pub mod capture;
pub mod chunker;
pub mod codec;
pub mod playback;
pub mod resampler;
pub mod timeline;
pub mod volume;

#[cfg(feature = "audio-io")]
pub use capture::CapturePipeline;
pub use chunker::FrameChunker;
pub use codec::{
    decode_audio_segment, decode_frame, encode_frame, AudioFrame, AudioSegment, MediaChunk,
    FRAME_SIZE, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE,
};
#[cfg(feature = "audio-io")]
pub use playback::PlaybackDevice;
pub use playback::PlaybackScheduler;
pub use resampler::AudioResampler;
pub use timeline::PlaybackTimeline;
pub use volume::VolumeMeter;
