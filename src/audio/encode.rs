//! WAV encoding of finalized recordings

use std::io::Cursor;

use super::backend::AudioError;

/// Concatenate captured blocks into one sample buffer
pub fn concat_chunks(chunks: &[Vec<f32>]) -> Vec<f32> {
    let total = chunks.iter().map(Vec::len).sum();
    let mut samples = Vec::with_capacity(total);
    for chunk in chunks {
        samples.extend_from_slice(chunk);
    }
    samples
}

/// Encode mono f32 samples as 16-bit PCM WAV bytes
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
