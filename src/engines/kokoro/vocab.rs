use std::collections::HashMap;
use std::path::Path;

use super::model::KokoroError;

/// Token ids of the built-in table, as runs of consecutive ids.
///
/// `(first_id, symbols)`: the n-th symbol of a run has id `first_id + n`.
const BUILTIN_RUNS: &[(i64, &str)] = &[
    (1, ";:,.!?"),
    (9, "\u{2014}\u{2026}\"()\u{201c}\u{201d} \u{0303}ʣʥʦʨᵝꭧAI"),
    (31, "O"),
    (33, "Q"),
    (35, "ST"),
    (39, "W"),
    (41, "Yᵊabcdef"),
    (50, "hijklmnopqrstuvwxyzɑɐɒæ"),
    (75, "βɔɕç"),
    (80, "ɖðʤə"),
    (85, "ɚɛɜ"),
    (90, "ɟ"),
    (92, "ɡ"),
    (99, "ɥ"),
    (101, "ɨɪʝ"),
    (110, "ɯɰŋɳɲɴø"),
    (118, "ɸθœ"),
    (123, "ɹ"),
    (125, "ɾɻ"),
    (128, "ʁɽʂʃʈʧ"),
    (135, "ʊʋ"),
    (138, "ʌɣɤ"),
    (142, "χʎ"),
    (147, "ʒʔ"),
    (156, "ˈˌː"),
    (162, "ʰ"),
    (164, "ʲ"),
    (169, "↓"),
    (171, "→↗↘"),
    (177, "ᵻ"),
];

/// Marks where a long phoneme sequence may be cut without splitting a word.
const CLAUSE_MARKS: &[char] = &[';', ':', ',', '.', '!', '?'];

/// Mapping from IPA symbols (and punctuation) to Kokoro token ids.
#[derive(Debug, Clone)]
pub struct Vocab {
    ids: HashMap<char, i64>,
}

impl Vocab {
    /// Read the `"vocab"` object of a Kokoro `config.json`.
    pub fn from_config(config_path: &Path) -> Result<Self, KokoroError> {
        let content = std::fs::read_to_string(config_path)?;
        Self::from_json(&content)
    }

    fn from_json(content: &str) -> Result<Self, KokoroError> {
        let json: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| KokoroError::Config(format!("Failed to parse JSON: {e}")))?;
        let table = json
            .get("vocab")
            .and_then(|v| v.as_object())
            .ok_or_else(|| KokoroError::Config("Missing 'vocab' object".to_string()))?;

        let ids = table
            .iter()
            .map(|(symbol, id)| {
                let mut chars = symbol.chars();
                match (chars.next(), chars.next(), id.as_i64()) {
                    (Some(ch), None, Some(id)) => Ok((ch, id)),
                    _ => Err(KokoroError::Config(format!(
                        "Invalid vocab entry {symbol:?}: {id}"
                    ))),
                }
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { ids })
    }

    /// The table shipped with Kokoro v1.0, for model directories without a
    /// `config.json`.
    pub fn builtin() -> Self {
        let ids = BUILTIN_RUNS
            .iter()
            .flat_map(|&(first, symbols)| symbols.chars().zip(first..))
            .collect();
        Self { ids }
    }

    /// Prefer `config.json` in `model_dir`, fall back to the built-in table.
    pub fn load(model_dir: &Path) -> Result<Self, KokoroError> {
        let config_path = model_dir.join("config.json");
        if config_path.exists() {
            log::info!("Loading vocab from {}", config_path.display());
            Self::from_config(&config_path)
        } else {
            log::warn!("config.json not found, using built-in vocab");
            Ok(Self::builtin())
        }
    }

    pub fn id(&self, symbol: char) -> Option<i64> {
        self.ids.get(&symbol).copied()
    }

    /// Token ids for an espeak IPA transcription. Unknown symbols and the `_`
    /// word-join marker are dropped.
    pub fn encode(&self, ipa: &str) -> Vec<i64> {
        ipa.lines()
            .flat_map(|line| line.trim().chars())
            .filter(|&ch| ch != '_')
            .filter_map(|ch| self.id(ch))
            .collect()
    }

    /// Ids after which a sequence may be split.
    pub fn clause_boundaries(&self) -> Vec<i64> {
        CLAUSE_MARKS.iter().filter_map(|&ch| self.id(ch)).collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_matches_kokoro_v1() {
        let vocab = Vocab::builtin();
        assert_eq!(vocab.len(), 114);
        assert_eq!(vocab.id(';'), Some(1));
        assert_eq!(vocab.id(' '), Some(16));
        assert_eq!(vocab.id('\u{0303}'), Some(17));
        assert_eq!(vocab.id('ə'), Some(83));
        assert_eq!(vocab.id('ˈ'), Some(156));
        assert_eq!(vocab.id('ᵻ'), Some(177));
        assert_eq!(vocab.id('g'), None);
        assert_eq!(vocab.clause_boundaries(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn encodes_ipa_dropping_unknown_symbols() {
        let vocab = Vocab::builtin();
        assert_eq!(vocab.encode("hə_l\n  g\n"), vec![50, 83, 54]);
    }

    #[test]
    fn reads_config_vocab() {
        let vocab = Vocab::from_json(r#"{"vocab": {"a": 7, ".": 2}}"#).unwrap();
        assert_eq!(vocab.id('a'), Some(7));
        assert_eq!(vocab.clause_boundaries(), vec![2]);
    }

    #[test]
    fn rejects_multi_char_config_keys() {
        assert!(matches!(
            Vocab::from_json(r#"{"vocab": {"ab": 7}}"#),
            Err(KokoroError::Config(_))
        ));
        assert!(Vocab::from_json(r#"{"other": {}}"#).is_err());
    }
}
