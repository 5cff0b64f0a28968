//! 16-bit PCM WAV decoding and encoding.
//!
//! Browsers record microphone input with the Web Audio API and ship it as a
//! RIFF/WAVE buffer. Only uncompressed 16-bit PCM is accepted; multi-channel
//! audio is downmixed to mono.

use crate::error::SpeechError;

/// Highest sample rate accepted from a client recording.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Mono PCM audio as f32 samples in [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PcmAudio {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

fn read_u16_le(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn read_u32_le(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// Decode a RIFF/WAVE buffer into mono samples.
pub fn decode_wav(data: &[u8]) -> Result<PcmAudio, SpeechError> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(SpeechError::InvalidAudio("not a RIFF/WAVE buffer".into()));
    }

    let mut format: Option<(u16, u16, u32, u16)> = None;
    let mut pcm: Option<&[u8]> = None;

    let mut pos = 12;
    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = read_u32_le(data, pos + 4) as usize;
        let body_start = pos + 8;
        let body_end = body_start.saturating_add(chunk_size).min(data.len());

        if chunk_id == b"fmt " && chunk_size >= 16 && body_start + 16 <= data.len() {
            format = Some((
                read_u16_le(data, body_start),
                read_u16_le(data, body_start + 2),
                read_u32_le(data, body_start + 4),
                read_u16_le(data, body_start + 14),
            ));
        } else if chunk_id == b"data" {
            pcm = Some(&data[body_start..body_end]);
        }

        pos = body_start.saturating_add(chunk_size);
        if chunk_size % 2 == 1 {
            pos += 1;
        }
    }

    let (audio_format, channels, sample_rate, bits_per_sample) =
        format.ok_or_else(|| SpeechError::InvalidAudio("missing fmt chunk".into()))?;
    if audio_format != 1 || bits_per_sample != 16 {
        return Err(SpeechError::InvalidAudio(format!(
            "unsupported encoding (format {}, {} bits); need 16-bit PCM",
            audio_format, bits_per_sample
        )));
    }
    if channels == 0 {
        return Err(SpeechError::InvalidAudio("channel count must be non-zero".into()));
    }
    if !(1..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        return Err(SpeechError::InvalidAudio(format!(
            "sample rate {} Hz outside 1..={} Hz",
            sample_rate, MAX_SAMPLE_RATE
        )));
    }
    let pcm = pcm.ok_or_else(|| SpeechError::InvalidAudio("missing data chunk".into()))?;

    let channels = channels as usize;
    let samples = pcm
        .chunks_exact(channels * 2)
        .map(|frame| {
            let sum: f32 = frame
                .chunks_exact(2)
                .map(|s| i16::from_le_bytes([s[0], s[1]]) as f32)
                .sum();
            sum / channels as f32 / 32768.0
        })
        .collect();

    Ok(PcmAudio {
        samples,
        sample_rate,
    })
}

/// Encode mono samples as a 16-bit PCM WAV buffer.
pub fn encode_wav(audio: &PcmAudio) -> Vec<u8> {
    let data_len = (audio.samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&audio.sample_rate.to_le_bytes());
    out.extend_from_slice(&audio.sample_rate.saturating_mul(2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in &audio.samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}
