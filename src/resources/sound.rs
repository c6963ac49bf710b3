//! 音效 (`Sounds/*.wav`)
//!
//! 最小的 RIFF/WAVE 解析：按块遍历，取 `fmt ` 和 `data`，其余块跳过。
//! 只接受未压缩 PCM。默认载荷是一段零长度的静音。

use crate::assets::{Asset, AssetKind, Handle, LoadContext};
use crate::errors::{CandelaError, Result};

/// Uncompressed PCM samples with their playback format.
#[derive(Debug)]
pub struct Sound {
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    data: Vec<u8>,
}

fn take<'a>(bytes: &mut &'a [u8], n: usize) -> Option<&'a [u8]> {
    if bytes.len() < n {
        return None;
    }
    let (head, tail) = bytes.split_at(n);
    *bytes = tail;
    Some(head)
}

fn take_u16(bytes: &mut &[u8]) -> Option<u16> {
    take(bytes, 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn take_u32(bytes: &mut &[u8]) -> Option<u32> {
    take(bytes, 4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

impl Sound {
    /// One channel of 16-bit silence at 44.1 kHz, zero samples long.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            data: Vec::new(),
        }
    }

    /// Parses a RIFF/WAVE file. `name` only labels the error.
    pub fn decode_wav(name: &str, bytes: &[u8]) -> Result<Self> {
        let corrupt = |detail: &str| CandelaError::CorruptAsset {
            kind: "sound",
            name: name.to_owned(),
            detail: detail.to_owned(),
        };

        let mut rest = bytes;
        match take(&mut rest, 4) {
            Some(b"RIFF") => {}
            _ => return Err(corrupt("not a RIFF file")),
        }
        take_u32(&mut rest).ok_or_else(|| corrupt("truncated RIFF size"))?;
        match take(&mut rest, 4) {
            Some(b"WAVE") => {}
            _ => return Err(corrupt("not a WAVE form")),
        }

        let mut format = None;
        let mut data = None;
        while !rest.is_empty() {
            let id = take(&mut rest, 4).ok_or_else(|| corrupt("truncated chunk header"))?;
            let id: [u8; 4] = [id[0], id[1], id[2], id[3]];
            let size = take_u32(&mut rest).ok_or_else(|| corrupt("truncated chunk header"))? as usize;
            let payload = take(&mut rest, size).ok_or_else(|| corrupt("chunk overruns the file"))?;
            // RIFF 块按 2 字节对齐
            if size % 2 == 1 && !rest.is_empty() {
                let _ = take(&mut rest, 1);
            }
            match &id {
                b"fmt " => {
                    let mut fmt = payload;
                    let audio_format =
                        take_u16(&mut fmt).ok_or_else(|| corrupt("short fmt chunk"))?;
                    if audio_format != 1 {
                        return Err(corrupt("compressed WAVE data is not supported"));
                    }
                    let channels = take_u16(&mut fmt).ok_or_else(|| corrupt("short fmt chunk"))?;
                    let sample_rate =
                        take_u32(&mut fmt).ok_or_else(|| corrupt("short fmt chunk"))?;
                    take_u32(&mut fmt).ok_or_else(|| corrupt("short fmt chunk"))?; // byte rate
                    take_u16(&mut fmt).ok_or_else(|| corrupt("short fmt chunk"))?; // block align
                    let bits_per_sample =
                        take_u16(&mut fmt).ok_or_else(|| corrupt("short fmt chunk"))?;
                    format = Some((channels, sample_rate, bits_per_sample));
                }
                b"data" => data = Some(payload.to_vec()),
                _ => {}
            }
        }

        let (channels, sample_rate, bits_per_sample) =
            format.ok_or_else(|| corrupt("no fmt chunk"))?;
        let data = data.ok_or_else(|| corrupt("no data chunk"))?;
        Ok(Self {
            channels,
            sample_rate,
            bits_per_sample,
            data,
        })
    }

    // 访问器

    #[must_use]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Playback length derived from the sample format.
    #[must_use]
    pub fn duration_secs(&self) -> f32 {
        let bytes_per_second =
            self.sample_rate * u32::from(self.channels) * u32::from(self.bits_per_sample / 8);
        if bytes_per_second == 0 {
            return 0.0;
        }
        self.data.len() as f32 / bytes_per_second as f32
    }
}

impl Asset for Sound {
    type Params = ();
    const KIND: AssetKind = AssetKind::Sound;

    fn new(_: &()) -> Self {
        Self::silent()
    }

    fn load_default(&mut self, _ctx: &mut LoadContext<'_>) {
        *self = Self::silent();
    }

    fn initialize(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let bytes = ctx.io().read_bytes(Self::KIND, ctx.name())?;
        *self = Self::decode_wav(ctx.name(), &bytes)?;
        Ok(())
    }
}

impl Handle<Sound> {
    #[must_use]
    pub fn duration_secs(&self) -> f32 {
        self.read().duration_secs()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-assembled PCM WAVE file.
    fn wav(channels: u16, sample_rate: u32, bits: u16, data: &[u8]) -> Vec<u8> {
        let byte_rate = sample_rate * u32::from(channels) * u32::from(bits / 8);
        let block_align = channels * (bits / 8);

        let mut fmt = Vec::new();
        fmt.extend_from_slice(&1_u16.to_le_bytes());
        fmt.extend_from_slice(&channels.to_le_bytes());
        fmt.extend_from_slice(&sample_rate.to_le_bytes());
        fmt.extend_from_slice(&byte_rate.to_le_bytes());
        fmt.extend_from_slice(&block_align.to_le_bytes());
        fmt.extend_from_slice(&bits.to_le_bytes());

        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        let riff_len = 4 + (8 + fmt.len()) + (8 + data.len() + data.len() % 2);
        out.extend_from_slice(&u32::try_from(riff_len).unwrap().to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&u32::try_from(fmt.len()).unwrap().to_le_bytes());
        out.extend_from_slice(&fmt);
        out.extend_from_slice(b"data");
        out.extend_from_slice(&u32::try_from(data.len()).unwrap().to_le_bytes());
        out.extend_from_slice(data);
        if data.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    #[test]
    fn pcm_fields_come_from_the_fmt_chunk() {
        let bytes = wav(2, 22_050, 16, &[1, 2, 3, 4]);
        let sound = Sound::decode_wav("beep", &bytes).unwrap();
        assert_eq!(sound.channels(), 2);
        assert_eq!(sound.sample_rate(), 22_050);
        assert_eq!(sound.bits_per_sample(), 16);
        assert_eq!(sound.data(), [1, 2, 3, 4]);
    }

    #[test]
    fn duration_follows_the_byte_rate() {
        let one_second = vec![0_u8; 44_100 * 2];
        let sound = Sound::decode_wav("tone", &wav(1, 44_100, 16, &one_second)).unwrap();
        assert!((sound.duration_secs() - 1.0).abs() < 1e-6);
        assert_eq!(Sound::silent().duration_secs(), 0.0);
    }

    #[test]
    fn odd_chunks_carry_a_pad_byte() {
        let mut bytes = wav(1, 8000, 8, &[7, 7, 7]);
        // an unknown chunk after the padded data chunk still parses, which
        // only works if the pad byte was consumed
        bytes.extend_from_slice(b"LIST");
        bytes.extend_from_slice(&4_u32.to_le_bytes());
        bytes.extend_from_slice(b"INFO");
        let padded = Sound::decode_wav("odd", &bytes);
        assert_eq!(padded.unwrap().data(), [7, 7, 7]);
    }

    #[test]
    fn truncation_and_garbage_are_reported_as_corrupt() {
        let bytes = wav(1, 8000, 8, &[1, 2]);
        for cut in [2, 10, 14, bytes.len() - 1] {
            let err = Sound::decode_wav("cut", &bytes[..cut]).unwrap_err();
            assert!(matches!(err, CandelaError::CorruptAsset { kind: "sound", .. }));
        }
        assert!(Sound::decode_wav("txt", b"not audio at all").is_err());
    }

    #[test]
    fn files_without_a_data_chunk_are_rejected() {
        let mut bytes = wav(1, 8000, 8, &[]);
        // drop the (empty) data chunk entirely
        bytes.truncate(bytes.len() - 8);
        let err = Sound::decode_wav("nodata", &bytes).unwrap_err();
        assert!(matches!(err, CandelaError::CorruptAsset { .. }));
    }
}
