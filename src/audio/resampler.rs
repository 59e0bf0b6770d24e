// Sample rate conversion using rubato
// Decoded buffers are converted to the context rate before they are attached to a node

use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

use crate::error::{Error, Result};

pub struct Resampler;

impl Resampler {
    /// Resample interleaved audio from `input_rate` to `output_rate`
    ///
    /// Returns a copy when the rates already match.
    pub fn resample(input: &[f32], input_rate: u32, output_rate: u32, channels: u16) -> Result<Vec<f32>> {
        if input_rate == output_rate || input.is_empty() {
            return Ok(input.to_vec());
        }
        if input_rate == 0 || output_rate == 0 || channels == 0 {
            return Err(Error::Decode(format!(
                "Cannot resample {}Hz -> {}Hz with {} channels",
                input_rate, output_rate, channels
            )));
        }

        let planar_input = Self::deinterleave(input, channels);
        let input_frames = planar_input[0].len();
        if input_frames == 0 {
            return Ok(Vec::new());
        }

        let ratio = output_rate as f64 / input_rate as f64;
        let expected_frames = (input_frames as f64 * ratio).round() as usize;

        let mut resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0,
            PolynomialDegree::Septic,
            input_frames,
            channels as usize,
        )
        .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

        // The first `delay` output frames are filter warm-up, not signal
        let delay = resampler.output_delay();
        let wanted = delay + expected_frames;

        let mut planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

        // Flush the tail still held in the filter. Short chunks can come back
        // empty while the interpolator fills, so bound the loop instead.
        let max_flushes = 16 + (wanted as f64 / (input_frames as f64 * ratio)).ceil() as usize;
        for _ in 0..max_flushes {
            if planar_output[0].len() >= wanted {
                break;
            }
            let tail = resampler
                .process_partial::<Vec<f32>>(None, None)
                .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;
            for (channel, flushed) in planar_output.iter_mut().zip(tail) {
                channel.extend_from_slice(&flushed);
            }
        }

        for channel in planar_output.iter_mut() {
            channel.drain(..delay.min(channel.len()));
            channel.truncate(expected_frames);
        }

        let output = Self::interleave(&planar_output);
        debug!(
            "Resampled {} frames at {}Hz to {} frames at {}Hz",
            input_frames,
            input_rate,
            output.len() / channels as usize,
            output_rate
        );
        Ok(output)
    }

    fn deinterleave(input: &[f32], channels: u16) -> Vec<Vec<f32>> {
        let channels = channels as usize;
        let frames = input.len() / channels;
        let mut planar = vec![Vec::with_capacity(frames); channels];

        for frame in input.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                planar[ch].push(sample);
            }
        }

        planar
    }

    fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
        let frames = planar.iter().map(Vec::len).min().unwrap_or(0);
        let mut output = Vec::with_capacity(frames * planar.len());

        for frame in 0..frames {
            for channel in planar {
                output.push(channel[frame]);
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_a_copy() {
        let input = vec![0.1, 0.2, 0.3, 0.4];
        let output = Resampler::resample(&input, 48000, 48000, 2).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_deinterleave_interleave() {
        let input = vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0];
        let planar = Resampler::deinterleave(&input, 2);
        assert_eq!(planar, vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]]);
        assert_eq!(Resampler::interleave(&planar), input);
    }

    #[test]
    fn test_upsample_keeps_length_and_phase() {
        let frames = 4410;
        let input: Vec<f32> = (0..frames)
            .flat_map(|i| {
                let s = (i as f32 * 0.01).sin() * 0.5;
                [s, s]
            })
            .collect();

        let output = Resampler::resample(&input, 44100, 48000, 2).unwrap();
        assert_eq!(output.len(), 4800 * 2);

        // Warm-up frames are trimmed: output frame k lines up with input time k * 44100 / 48000
        assert!(output[0].abs() < 0.02, "first sample {}", output[0]);
        for k in [100usize, 1000, 2400, 4000] {
            let expected = (k as f32 * 44100.0 / 48000.0 * 0.01).sin() * 0.5;
            assert!((output[k * 2] - expected).abs() < 0.02, "frame {}: {} vs {}", k, output[k * 2], expected);
            assert_eq!(output[k * 2], output[k * 2 + 1]);
        }
    }

    #[test]
    fn test_constant_signal_keeps_level_and_length() {
        let input = vec![0.5f32; 800];
        let output = Resampler::resample(&input, 8000, 16000, 1).unwrap();
        assert_eq!(output.len(), 1600);
        for (k, sample) in output.iter().enumerate().take(1500).skip(100) {
            assert!((sample - 0.5).abs() < 1e-3, "frame {}: {}", k, sample);
        }
    }

    #[test]
    fn test_short_input_is_not_lost() {
        for frames in 1..=4usize {
            let input = vec![0.25f32; frames];
            let output = Resampler::resample(&input, 8000, 44100, 1).unwrap();
            let expected = (frames as f64 * 44100.0 / 8000.0).round() as usize;
            assert_eq!(output.len(), expected, "{} input frames", frames);
        }
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(Resampler::resample(&[0.0, 0.0], 0, 48000, 1).is_err());
    }
}
