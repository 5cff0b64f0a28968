//! Single-utterance capture with energy-based voice activity detection.
//!
//! The microphone recording is scanned in short frames. Leading silence is
//! skipped, and the utterance ends at the first run of silence at least as
//! long as the configured timeout, or when the duration cap is reached.

use arctic_core::config::VoiceConfig;

use crate::error::SpeechError;
use crate::wav::PcmAudio;

/// Analysis frame length in milliseconds.
const FRAME_MS: u32 = 30;

/// Result of voice activity detection on an audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadResult {
    Speech,
    Silence,
    /// The frame was empty.
    Unknown,
}

/// Classifies short audio frames as speech or silence.
pub trait VoiceActivityDetector: Send + Sync {
    fn detect(&self, frame: &[f32]) -> VadResult;
}

/// RMS energy detector.
#[derive(Debug, Clone)]
pub struct EnergyVad {
    threshold: f32,
}

impl EnergyVad {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn detect(&self, frame: &[f32]) -> VadResult {
        if frame.is_empty() {
            return VadResult::Unknown;
        }
        let rms = (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt();
        if rms > self.threshold {
            VadResult::Speech
        } else {
            VadResult::Silence
        }
    }
}

/// Cuts one utterance out of a longer recording.
pub struct UtteranceDetector<V = EnergyVad> {
    vad: V,
    silence_timeout_ms: u32,
    max_duration_secs: u32,
}

impl UtteranceDetector<EnergyVad> {
    pub fn from_config(config: &VoiceConfig) -> Self {
        Self::new(
            EnergyVad::new(config.energy_threshold),
            config.silence_timeout_ms,
            config.max_duration_secs,
        )
    }
}

impl<V: VoiceActivityDetector> UtteranceDetector<V> {
    pub fn new(vad: V, silence_timeout_ms: u32, max_duration_secs: u32) -> Self {
        Self {
            vad,
            silence_timeout_ms,
            max_duration_secs,
        }
    }

    /// Return the first utterance in `audio`, or `Inaudible` if no frame
    /// contains speech.
    pub fn capture(&self, audio: &PcmAudio) -> Result<PcmAudio, SpeechError> {
        let rate = audio.sample_rate as u64;
        let frame_len = (rate * FRAME_MS as u64 / 1000).max(1) as usize;
        let silence_frames_to_stop = (self.silence_timeout_ms / FRAME_MS).max(1) as usize;
        let max_samples = (rate * self.max_duration_secs as u64).min(usize::MAX as u64) as usize;

        let mut start: Option<usize> = None;
        let mut end = 0usize;
        let mut silent_run = 0usize;

        for (index, frame) in audio.samples.chunks(frame_len).enumerate() {
            let offset = index * frame_len;
            match (start, self.vad.detect(frame)) {
                (None, VadResult::Speech) => {
                    start = Some(offset);
                    end = offset + frame.len();
                }
                (None, _) => {}
                (Some(_), VadResult::Speech) => {
                    silent_run = 0;
                    end = offset + frame.len();
                }
                (Some(_), _) => {
                    silent_run += 1;
                    if silent_run >= silence_frames_to_stop {
                        break;
                    }
                }
            }
            if let Some(s) = start {
                if max_samples > 0 && end - s >= max_samples {
                    end = s + max_samples;
                    break;
                }
            }
        }

        let start = start.ok_or(SpeechError::Inaudible)?;
        tracing::debug!(
            start_sample = start,
            end_sample = end,
            sample_rate = audio.sample_rate,
            "Utterance captured"
        );
        Ok(PcmAudio {
            samples: audio.samples[start..end].to_vec(),
            sample_rate: audio.sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 1_000; // 30 samples per frame

    fn tone(ms: u32) -> Vec<f32> {
        (0..ms * RATE / 1000)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect()
    }

    fn silence(ms: u32) -> Vec<f32> {
        vec![0.0; (ms * RATE / 1000) as usize]
    }

    fn audio(parts: &[Vec<f32>]) -> PcmAudio {
        PcmAudio {
            samples: parts.concat(),
            sample_rate: RATE,
        }
    }

    fn detector() -> UtteranceDetector {
        UtteranceDetector::new(EnergyVad::new(0.01), 300, 30)
    }

    #[test]
    fn test_energy_vad() {
        let vad = EnergyVad::new(0.1);
        assert_eq!(vad.detect(&[0.5, -0.5]), VadResult::Speech);
        assert_eq!(vad.detect(&[0.01, -0.01]), VadResult::Silence);
        assert_eq!(vad.detect(&[]), VadResult::Unknown);
    }

    #[test]
    fn test_all_silence_is_inaudible() {
        let result = detector().capture(&audio(&[silence(2_000)]));
        assert!(matches!(result, Err(SpeechError::Inaudible)));
    }

    #[test]
    fn test_leading_silence_is_trimmed() {
        let captured = detector()
            .capture(&audio(&[silence(600), tone(600)]))
            .unwrap();
        assert_eq!(captured.samples.len(), 600);
        assert!(captured.samples.iter().all(|s| s.abs() > 0.1));
    }

    #[test]
    fn test_stops_at_long_silence() {
        let recording = audio(&[tone(300), silence(900), tone(300)]);
        let captured = detector().capture(&recording).unwrap();
        assert_eq!(captured.samples.len(), 300);
    }

    #[test]
    fn test_short_pause_does_not_end_utterance() {
        let recording = audio(&[tone(300), silence(120), tone(300)]);
        let captured = detector().capture(&recording).unwrap();
        assert_eq!(captured.samples.len(), 720);
    }

    #[test]
    fn test_extreme_sample_rate_is_handled() {
        let recording = PcmAudio {
            samples: tone(300),
            sample_rate: u32::MAX,
        };
        let captured = detector().capture(&recording).unwrap();
        assert_eq!(captured.samples.len(), 300);
        assert_eq!(captured.sample_rate, u32::MAX);
    }

    #[test]
    fn test_duration_cap() {
        let capped = UtteranceDetector::new(EnergyVad::new(0.01), 300, 1);
        let captured = capped.capture(&audio(&[tone(3_000)])).unwrap();
        assert_eq!(captured.samples.len(), RATE as usize);
    }
}
