//! Offline audio sources for feeding a session: WAV decoding and
//! sample-rate conversion to the 16 kHz the classifier expects.
//!
//! Live capture is out of scope; callers push whatever their transport
//! delivers.

pub mod resample;
pub mod wav;

pub use resample::{convert, RateConverter};
pub use wav::{read_wav_mono, read_wav_mono_16k};
