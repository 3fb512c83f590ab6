use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::model::{KokoroError, STYLE_DIM};

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// One style embedding.
pub type Style = [f32; STYLE_DIM];

/// Style embeddings of every voice in a `voices-v1.0.bin` archive.
///
/// A voice holds one embedding per input length; the one matching the
/// phoneme count of a paragraph is used for all of that paragraph.
pub struct VoiceStore {
    voices: BTreeMap<String, Vec<Style>>,
}

impl VoiceStore {
    /// Read an `.npz` archive of `{voice}.npy` float32 arrays.
    pub fn load(path: &Path) -> Result<Self, KokoroError> {
        let mut archive = zip::ZipArchive::new(File::open(path)?)
            .map_err(|e| KokoroError::VoiceParse(format!("{}: {e}", path.display())))?;

        let mut voices = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| KokoroError::VoiceParse(format!("entry {i}: {e}")))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let Some(voice) = name.strip_suffix(".npy").filter(|v| !v.is_empty()) else {
                log::debug!("Skipping non-voice entry {name}");
                continue;
            };
            let voice = voice.to_string();

            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            voices.insert(voice, parse_npy(&data, &name)?);
        }

        log::info!("Loaded {} voices", voices.len());
        Ok(Self { voices })
    }

    /// Style for `voice` at `index`, clamped to the last available length.
    pub fn style(&self, voice: &str, index: usize) -> Result<Style, KokoroError> {
        let styles = self
            .voices
            .get(voice)
            .filter(|styles| !styles.is_empty())
            .ok_or_else(|| KokoroError::VoiceNotFound(voice.to_string()))?;
        Ok(styles[index.min(styles.len() - 1)])
    }

    pub fn contains(&self, voice: &str) -> bool {
        self.voices.contains_key(voice)
    }

    /// Voice names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.voices.keys().cloned().collect()
    }
}

/// Decode a little-endian float32 `.npy` array of shape `[N, 256]` (or any
/// shape whose trailing axis is 256).
fn parse_npy(data: &[u8], name: &str) -> Result<Vec<Style>, KokoroError> {
    let invalid = |reason: String| KokoroError::VoiceParse(format!("{name}: {reason}"));

    if data.len() < 10 || !data.starts_with(NPY_MAGIC) {
        return Err(invalid("not a numpy array".to_string()));
    }
    // Version 1.x: u16 header length at bytes 8..10.
    let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
    let body = data
        .get(10 + header_len..)
        .ok_or_else(|| invalid(format!("header truncated at {} bytes", data.len())))?;
    let header = String::from_utf8_lossy(&data[10..10 + header_len]);
    if !header.contains("'<f4'") {
        return Err(invalid(format!("expected little-endian float32, header {header}")));
    }

    let row_bytes = STYLE_DIM * 4;
    if body.len() % row_bytes != 0 {
        return Err(invalid(format!(
            "{} data bytes do not divide into {STYLE_DIM}-float styles",
            body.len()
        )));
    }

    Ok(body
        .chunks_exact(row_bytes)
        .map(|row| {
            let mut style = [0f32; STYLE_DIM];
            for (value, bytes) in style.iter_mut().zip(row.chunks_exact(4)) {
                *value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
            style
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npy(rows: usize, fill: impl Fn(usize) -> f32) -> Vec<u8> {
        let mut header = format!(
            "{{'descr': '<f4', 'fortran_order': False, 'shape': ({rows}, 1, {STYLE_DIM}), }}"
        );
        while (10 + header.len() + 1) % 64 != 0 {
            header.push(' ');
        }
        header.push('\n');

        let mut data = NPY_MAGIC.to_vec();
        data.extend_from_slice(&[1, 0]);
        data.extend_from_slice(&(header.len() as u16).to_le_bytes());
        data.extend_from_slice(header.as_bytes());
        for i in 0..rows * STYLE_DIM {
            data.extend_from_slice(&fill(i).to_le_bytes());
        }
        data
    }

    #[test]
    fn parses_style_rows() {
        let styles = parse_npy(&npy(3, |i| i as f32), "af_test.npy").unwrap();
        assert_eq!(styles.len(), 3);
        assert_eq!(styles[0][0], 0.0);
        assert_eq!(styles[1][0], STYLE_DIM as f32);
        assert_eq!(styles[2][STYLE_DIM - 1], (3 * STYLE_DIM - 1) as f32);
    }

    #[test]
    fn rejects_truncated_or_foreign_data() {
        assert!(parse_npy(b"PK\x03\x04", "x.npy").is_err());

        let mut short = npy(1, |_| 0.0);
        short.pop();
        assert!(matches!(
            parse_npy(&short, "x.npy"),
            Err(KokoroError::VoiceParse(_))
        ));

        let mut doubles = npy(1, |_| 0.0);
        let dtype = doubles.windows(3).position(|w| w == b"<f4").unwrap();
        doubles[dtype + 2] = b'8';
        assert!(parse_npy(&doubles, "x.npy").is_err());
    }

    #[test]
    fn style_index_is_clamped() {
        let store = VoiceStore {
            voices: BTreeMap::from([(
                "af_test".to_string(),
                parse_npy(&npy(2, |i| (i / STYLE_DIM) as f32), "af_test.npy").unwrap(),
            )]),
        };
        assert_eq!(store.style("af_test", 0).unwrap()[0], 0.0);
        assert_eq!(store.style("af_test", 500).unwrap()[0], 1.0);
        assert!(matches!(
            store.style("bf_missing", 0),
            Err(KokoroError::VoiceNotFound(v)) if v == "bf_missing"
        ));
        assert_eq!(store.names(), vec!["af_test"]);
    }
}
