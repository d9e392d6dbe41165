use anyhow::{Context, Result};
use base64::Engine;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Output rate assumed until the conversation metadata says otherwise.
pub const DEFAULT_AGENT_SAMPLE_RATE: u32 = 16000;

/// Decodes a base64 string of little-endian PCM16 audio into samples.
pub fn decode_i16(base64_fragment: &str) -> Vec<i16> {
    if let Ok(pcm16_bytes) = base64::engine::general_purpose::STANDARD.decode(base64_fragment) {
        pcm16_bytes
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
            .collect()
    } else {
        tracing::error!("Failed to decode base64 audio fragment");
        Vec::new()
    }
}

pub fn encode_i16(pcm16: &[i16]) -> String {
    let pcm16_bytes: Vec<u8> = pcm16
        .iter()
        .flat_map(|&sample| sample.to_le_bytes())
        .collect();
    base64::engine::general_purpose::STANDARD.encode(&pcm16_bytes)
}

/// Extracts the sample rate from an audio format name such as `pcm_16000`.
///
/// Only PCM formats are recognised; anything else yields `None`.
pub fn parse_sample_rate(format: &str) -> Option<u32> {
    let (encoding, rate) = format.rsplit_once('_')?;
    if encoding != "pcm" {
        return None;
    }
    rate.parse().ok().filter(|&rate| rate > 0)
}

pub fn duration_secs(samples: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    samples as f64 / sample_rate as f64
}

/// Peak amplitude of a chunk, normalised to `0.0..=1.0`.
pub fn peak_level(pcm16: &[i16]) -> f32 {
    pcm16
        .iter()
        .map(|&sample| (sample as f32 / 32768.0).abs())
        .fold(0.0, f32::max)
}

/// Appends the agent's voice to a raw PCM16 file as it arrives.
pub struct AudioRecorder {
    file: File,
    path: PathBuf,
    sample_rate: u32,
    samples_written: usize,
}

impl AudioRecorder {
    /// Opens `path` for appending, creating it if needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open audio output {}", path.display()))?;
        Ok(Self {
            file,
            path,
            sample_rate: DEFAULT_AGENT_SAMPLE_RATE,
            samples_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    /// Decodes one base64 chunk and appends its samples. Returns how many
    /// samples were written.
    pub fn write_chunk(&mut self, base64_fragment: &str) -> Result<usize> {
        let samples = decode_i16(base64_fragment);
        if samples.is_empty() {
            return Ok(0);
        }
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.file
            .write_all(&bytes)
            .with_context(|| format!("Failed to write audio to {}", self.path.display()))?;
        self.samples_written += samples.len();
        debug!(
            samples = samples.len(),
            peak = peak_level(&samples),
            "Recorded agent audio chunk."
        );
        Ok(samples.len())
    }

    pub fn samples_written(&self) -> usize {
        self.samples_written
    }

    /// Seconds of audio recorded so far at the current sample rate.
    pub fn duration_secs(&self) -> f64 {
        duration_secs(self.samples_written, self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_decode_i16() {
        let original = vec![256i16, -256i16, 0i16];
        let decoded = decode_i16(&encode_i16(&original));
        assert_eq!(decoded, original);

        // Test with invalid base64
        assert!(decode_i16("invalid_base64!").is_empty());

        // Test with empty string
        assert!(decode_i16("").is_empty());

        // Odd trailing byte is dropped
        let test_data = vec![0x00u8, 0x40u8, 0x01u8];
        let base64_input = base64::engine::general_purpose::STANDARD.encode(&test_data);
        assert_eq!(decode_i16(&base64_input), vec![16384]);
    }

    #[test]
    fn test_parse_sample_rate() {
        assert_eq!(parse_sample_rate("pcm_16000"), Some(16000));
        assert_eq!(parse_sample_rate("pcm_44100"), Some(44100));
        assert_eq!(parse_sample_rate("ulaw_8000"), None);
        assert_eq!(parse_sample_rate("pcm_fast"), None);
        assert_eq!(parse_sample_rate("pcm_0"), None);
        assert_eq!(parse_sample_rate("pcm"), None);
        assert_eq!(parse_sample_rate(""), None);
    }

    #[test]
    fn test_duration_secs() {
        assert_abs_diff_eq!(duration_secs(16000, 16000), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(duration_secs(8000, 16000), 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(duration_secs(22050, 44100), 0.5, epsilon = 1e-9);
        assert_eq!(duration_secs(100, 0), 0.0);
    }

    #[test]
    fn test_peak_level() {
        assert_abs_diff_eq!(peak_level(&[0, 16384, -8192]), 0.5, epsilon = 0.0001);
        assert_abs_diff_eq!(peak_level(&[i16::MIN]), 1.0, epsilon = 0.0001);
        assert_eq!(peak_level(&[]), 0.0);
    }

    #[test]
    fn test_recorder_appends_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.pcm");

        let mut recorder = AudioRecorder::create(&path).unwrap();
        recorder.set_sample_rate(8000);
        assert_eq!(recorder.write_chunk(&encode_i16(&[1, 2, 3, 4])).unwrap(), 4);
        assert_eq!(recorder.write_chunk(&encode_i16(&[-1, -2])).unwrap(), 2);
        assert_eq!(recorder.write_chunk("not base64!").unwrap(), 0);

        assert_eq!(recorder.samples_written(), 6);
        assert_abs_diff_eq!(recorder.duration_secs(), 6.0 / 8000.0, epsilon = 1e-9);
        assert_eq!(recorder.path(), path.as_path());

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 12);
        assert_eq!(i16::from_le_bytes([bytes[10], bytes[11]]), -2);
    }

    #[test]
    fn test_recorder_appends_to_existing_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), [0u8, 0u8]).unwrap();

        let mut recorder = AudioRecorder::create(file.path()).unwrap();
        recorder.write_chunk(&encode_i16(&[7])).unwrap();

        let bytes = std::fs::read(file.path()).unwrap();
        assert_eq!(bytes, vec![0, 0, 7, 0]);
    }
}
