// Audio decoder using Symphonia
// Decodes an in-memory payload to raw PCM samples

use bytes::Bytes;
use std::io::Cursor;
use symphonia::core::audio::{AudioBufferRef, AudioPlanes, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::{debug, warn};

use crate::audio::buffer::AudioBuffer;
use crate::error::{Error, Result};

pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
}

impl AudioDecoder {
    /// Detect the container format of a payload and prepare for decoding
    ///
    /// `hint` is a resource name or file name; its extension, if any, helps
    /// symphonia pick a format reader.
    pub fn open(data: Bytes, hint: Option<&str>) -> Result<Self> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

        let mut format_hint = Hint::new();
        if let Some(ext) = hint.and_then(extension_of) {
            format_hint.with_extension(ext);
        }

        let detected = symphonia::default::get_probe()
            .format(&format_hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to detect format: {}", e)))?;

        let format = detected.format;

        // Find the first audio track
        let track = format.tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Decode next packet, returns interleaved f32 samples
    /// Returns None when end of stream is reached
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Failed to read packet: {}", e))),
            };

            // Skip packets from other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    return Ok(Some(Self::audio_buf_to_f32(&decoded)));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Decode error (skipping packet): {}", e);
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Decode failed: {}", e))),
            }
        }
    }

    /// Decode the whole payload into one buffer
    pub fn decode_all(mut self) -> Result<AudioBuffer> {
        let mut samples = Vec::new();
        while let Some(packet) = self.decode_next()? {
            samples.extend_from_slice(&packet);
        }

        if samples.is_empty() {
            return Err(Error::Decode("Payload contains no audio frames".to_string()));
        }

        let buffer = AudioBuffer::new(samples, self.sample_rate, self.channels as u16);
        debug!(
            "Decoded {} frames at {}Hz ({} channels)",
            buffer.frames(),
            buffer.sample_rate(),
            buffer.channels()
        );
        Ok(buffer)
    }

    /// Convert any AudioBufferRef to interleaved f32 samples
    fn audio_buf_to_f32(buf: &AudioBufferRef) -> Vec<f32> {
        match buf {
            AudioBufferRef::F32(b) => {
                Self::interleave_convert(b.planes(), b.frames(), |s: f32| s)
            }
            AudioBufferRef::F64(b) => {
                Self::interleave_convert(b.planes(), b.frames(), |s: f64| s as f32)
            }
            AudioBufferRef::S8(b) => {
                let scale = 1.0 / 128.0;
                Self::interleave_convert(b.planes(), b.frames(), |s: i8| s as f32 * scale)
            }
            AudioBufferRef::S16(b) => {
                let scale = 1.0 / 32768.0;
                Self::interleave_convert(b.planes(), b.frames(), |s: i16| s as f32 * scale)
            }
            AudioBufferRef::S24(b) => {
                let scale = 1.0 / 8388608.0;
                Self::interleave_convert(b.planes(), b.frames(), |s| s.inner() as f32 * scale)
            }
            AudioBufferRef::S32(b) => {
                let scale = 1.0 / 2147483648.0;
                Self::interleave_convert(b.planes(), b.frames(), |s: i32| s as f32 * scale)
            }
            AudioBufferRef::U8(b) => {
                Self::interleave_convert(b.planes(), b.frames(), |s: u8| (s as f32 - 128.0) / 128.0)
            }
            AudioBufferRef::U16(b) => {
                Self::interleave_convert(b.planes(), b.frames(), |s: u16| (s as f32 - 32768.0) / 32768.0)
            }
            AudioBufferRef::U24(b) => {
                Self::interleave_convert(b.planes(), b.frames(), |s| (s.inner() as f32 - 8388608.0) / 8388608.0)
            }
            AudioBufferRef::U32(b) => {
                Self::interleave_convert(b.planes(), b.frames(), |s: u32| (s as f64 - 2147483648.0) as f32 / 2147483648.0)
            }
        }
    }

    fn interleave_convert<T: Sample + Copy, F: Fn(T) -> f32>(
        planes: AudioPlanes<T>,
        frames: usize,
        convert: F,
    ) -> Vec<f32> {
        let planes = planes.planes();
        if planes.is_empty() || frames == 0 {
            return vec![];
        }

        let mut interleaved = Vec::with_capacity(frames * planes.len());
        for frame in 0..frames {
            for plane in planes {
                interleaved.push(convert(plane[frame]));
            }
        }

        interleaved
    }
}

/// Extension of the last path segment of a resource name, if any
fn extension_of(name: &str) -> Option<&str> {
    let file = name.rsplit('/').next().unwrap_or(name);
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}
