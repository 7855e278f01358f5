//! TTS Adapter - TTS 引擎实现

mod fake_tts_client;
mod http_tts_client;
mod wav;

pub use fake_tts_client::{FakeTtsClient, FakeTtsClientConfig};
pub use http_tts_client::{HttpTtsClient, HttpTtsClientConfig};
pub use wav::{extract_pcm, WavFormat};
