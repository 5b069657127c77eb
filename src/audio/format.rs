//! Clip packaging: mixdown, resampling, and in-memory WAV encoding
//!
//! The backend expects a single 16kHz mono WAV clip regardless of what the
//! capture device produced, so the raw interleaved take is mixed to mono,
//! resampled with rubato, converted to i16, and written to an in-memory
//! WAV buffer at stop time.

use std::io::Cursor;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::capture::AudioError;

/// Sample rate of every packaged clip
pub const CLIP_SAMPLE_RATE: u32 = 16_000;

/// Resampler chunk size in frames
const CHUNK_FRAMES: usize = 1024;

/// Mix interleaved multi-channel samples down to mono
pub fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample a mono take from `source_rate` to the clip rate
///
/// Runs the whole take through a sinc resampler in fixed-size chunks,
/// zero-padding the final partial chunk and trimming the output back to
/// the expected length.
pub fn resample_to_clip_rate(mono: &[f32], source_rate: u32) -> Result<Vec<f32>, AudioError> {
    if source_rate == CLIP_SAMPLE_RATE {
        return Ok(mono.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(
        CLIP_SAMPLE_RATE as f64 / source_rate as f64,
        2.0,
        params,
        CHUNK_FRAMES,
        1,
    )
    .map_err(|e| AudioError::Stream(format!("resampler construction failed: {}", e)))?;

    let expected_len =
        (mono.len() as f64 * CLIP_SAMPLE_RATE as f64 / source_rate as f64).round() as usize;
    let mut output = Vec::with_capacity(expected_len);
    let mut chunk = vec![0.0f32; CHUNK_FRAMES];

    for input in mono.chunks(CHUNK_FRAMES) {
        let frames = if input.len() == CHUNK_FRAMES {
            input
        } else {
            chunk[..input.len()].copy_from_slice(input);
            chunk[input.len()..].fill(0.0);
            &chunk[..]
        };
        let waves = resampler
            .process(&[frames], None)
            .map_err(|e| AudioError::Stream(format!("resampling failed: {}", e)))?;
        if let Some(wave) = waves.into_iter().next() {
            output.extend(wave);
        }
    }

    output.truncate(expected_len);
    Ok(output)
}

/// Convert f32 samples in [-1, 1] to i16
pub fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
        .collect()
}

/// Encode 16kHz mono i16 samples as a WAV byte buffer
pub fn encode_wav(samples: &[i16]) -> Result<Vec<u8>, AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: CLIP_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| AudioError::Stream(format!("WAV writer failed: {}", e)))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| AudioError::Stream(format!("WAV write failed: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| AudioError::Stream(format!("WAV finalise failed: {}", e)))?;
    }
    Ok(cursor.into_inner())
}

/// Package a raw interleaved take into a 16kHz mono WAV buffer
///
/// Returns the encoded bytes and the clip duration in seconds.
pub fn package_take(
    samples: &[f32],
    source_rate: u32,
    channels: usize,
) -> Result<(Vec<u8>, f64), AudioError> {
    let mono = mix_to_mono(samples, channels);
    let resampled = resample_to_clip_rate(&mono, source_rate)?;
    let pcm = to_i16(&resampled);
    let duration = pcm.len() as f64 / CLIP_SAMPLE_RATE as f64;
    let bytes = encode_wav(&pcm)?;
    Ok((bytes, duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_stereo_to_mono() {
        let stereo = [0.5, -0.5, 0.3, 0.1];
        let mono = mix_to_mono(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.0).abs() < f32::EPSILON);
        assert!((mono[1] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_mix_mono_passthrough() {
        let mono_in = [0.1, 0.2, 0.3];
        assert_eq!(mix_to_mono(&mono_in, 1), mono_in.to_vec());
    }

    #[test]
    fn test_resample_identity_at_clip_rate() {
        let samples = vec![0.25; 1000];
        let out = resample_to_clip_rate(&samples, CLIP_SAMPLE_RATE).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn test_resample_48k_to_16k() {
        // 48k -> 16k should reduce the sample count to a third
        let samples = vec![0.1f32; 48_000];
        let out = resample_to_clip_rate(&samples, 48_000).unwrap();
        assert_eq!(out.len(), 16_000);
    }

    #[test]
    fn test_to_i16_clamps() {
        let converted = to_i16(&[0.0, 1.0, -1.0, 2.0]);
        assert_eq!(converted[0], 0);
        assert_eq!(converted[1], 32767);
        assert_eq!(converted[3], 32767);
        assert!(converted[2] <= -32767);
    }

    #[test]
    fn test_encode_wav_is_readable() {
        let pcm: Vec<i16> = (0..1600).map(|i| (i % 100) as i16).collect();
        let bytes = encode_wav(&pcm).unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, CLIP_SAMPLE_RATE);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 1600);
    }

    #[test]
    fn test_package_take_duration() {
        // One second of stereo at 48kHz packages to one second at 16kHz
        let samples = vec![0.05f32; 48_000 * 2];
        let (bytes, duration) = package_take(&samples, 48_000, 2).unwrap();
        assert!((duration - 1.0).abs() < 0.01);
        assert!(!bytes.is_empty());
    }
}
