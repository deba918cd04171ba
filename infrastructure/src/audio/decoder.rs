//! Decoding of inbound audio chunks.

use murmur_domain::audio::pcm::{mime_essence, mime_sample_rate};
use murmur_domain::{DecodeError, PcmBuffer};
use std::io::Cursor;

/// Decode `encoded` according to `mime_type`.
///
/// Raw PCM (`audio/pcm`, `audio/l16`) is 16-bit little-endian; its rate
/// comes from the `rate=` parameter, else `default_rate`. WAV containers
/// carry their own format.
pub fn decode_chunk(
    encoded: &[u8],
    mime_type: &str,
    default_rate: u32,
) -> Result<PcmBuffer, DecodeError> {
    match mime_essence(mime_type).as_str() {
        "audio/pcm" | "audio/l16" | "audio/raw" => {
            let rate = mime_sample_rate(mime_type).unwrap_or(default_rate);
            PcmBuffer::from_le_bytes(encoded, rate, mime_channels(mime_type).unwrap_or(1))
        }
        "audio/wav" | "audio/wave" | "audio/x-wav" => decode_wav(encoded),
        _ => Err(DecodeError::UnsupportedCodec(mime_type.to_string())),
    }
}

fn mime_channels(mime_type: &str) -> Option<u16> {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("channels"))
        .and_then(|(_, value)| value.trim().parse().ok())
}

fn decode_wav(bytes: &[u8]) -> Result<PcmBuffer, DecodeError> {
    let malformed = |e: hound::Error| DecodeError::MalformedAudio(e.to_string());
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).map_err(malformed)?;
    let spec = reader.spec();

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(malformed)?,
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(|sample| (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<Result<Vec<_>, _>>()
            .map_err(malformed)?,
        (format, bits) => {
            return Err(DecodeError::UnsupportedCodec(format!(
                "WAV {:?} {}-bit",
                format, bits
            )));
        }
    };

    Ok(PcmBuffer::new(samples, spec.sample_rate, spec.channels))
}
