//! Text → Kokoro token ids, via the `espeak-ng` command line.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::model::KokoroError;
use super::vocab::Vocab;

/// Voice prefix → espeak-ng language code. Unlisted prefixes read as `en-us`.
const LANGUAGES: &[(&str, &str)] = &[
    ("af", "en-us"),
    ("am", "en-us"),
    ("bf", "en-gb"),
    ("bm", "en-gb"),
    ("ef", "es"),
    ("em", "es"),
    ("ff", "fr"),
    ("hf", "hi"),
    ("hm", "hi"),
    ("if", "it"),
    ("im", "it"),
    ("jf", "ja"),
    ("jm", "ja"),
    ("pf", "pt-br"),
    ("pm", "pt-br"),
    ("zf", "cmn"),
    ("zm", "cmn"),
];

/// espeak-ng language for a voice id such as `bf_alice`.
pub fn voice_language(voice: &str) -> &'static str {
    let prefix = voice.split('_').next().unwrap_or_default();
    LANGUAGES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map_or("en-us", |&(_, lang)| lang)
}

/// Where to find espeak-ng. `None` fields use the system installation.
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    /// espeak-ng executable; defaults to `espeak-ng` on `PATH`.
    pub bin_path: Option<PathBuf>,
    /// Passed to espeak-ng as `ESPEAK_DATA_PATH`.
    pub data_path: Option<PathBuf>,
}

/// Converts text into Kokoro token ids.
///
/// Punctuation is kept out of espeak's hands and mapped straight to its
/// token, so clause boundaries survive phonemization.
#[derive(Debug, Clone, Default)]
pub struct Phonemizer {
    espeak: EspeakConfig,
}

/// Marks that bypass espeak and map straight to their own token.
const CLAUSE_MARKS: &[char] = &[
    '.', '!', '?', ',', ';', ':', '\u{2014}', '\u{2026}', '"', '(', ')', '\u{201c}', '\u{201d}',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Index into `Segments::phrases`.
    Phrase(usize),
    Mark(char),
}

/// Text laid out as espeak phrases and the marks between them.
#[derive(Debug, Default, PartialEq, Eq)]
struct Segments {
    phrases: Vec<String>,
    slots: Vec<Slot>,
}

impl Segments {
    /// Line breaks read as `.`; a `.` or `,` between two digits stays in the number.
    fn parse(text: &str) -> Self {
        let mut segments = Self::default();
        let mut phrase = String::new();
        let mut prev: Option<char> = None;
        let mut chars = text.chars().peekable();

        while let Some(ch) = chars.next() {
            let mark = match ch {
                '\n' | '\r' => Some('.'),
                '.' | ',' if prev.is_some_and(|p| p.is_ascii_digit())
                    && chars.peek().is_some_and(char::is_ascii_digit) =>
                {
                    None
                }
                _ if CLAUSE_MARKS.contains(&ch) => Some(ch),
                _ => None,
            };
            match mark {
                Some(mark) => {
                    segments.close_phrase(&phrase);
                    phrase.clear();
                    segments.slots.push(Slot::Mark(mark));
                }
                None => phrase.push(ch),
            }
            prev = Some(ch);
        }
        segments.close_phrase(&phrase);
        segments
    }

    fn close_phrase(&mut self, raw: &str) {
        let words: Vec<&str> = raw.split_whitespace().collect();
        if !words.is_empty() {
            self.slots.push(Slot::Phrase(self.phrases.len()));
            self.phrases.push(words.join(" "));
        }
    }
}

impl Phonemizer {
    pub fn new(espeak: EspeakConfig) -> Self {
        Self { espeak }
    }

    pub fn phonemize(&self, text: &str, lang: &str, vocab: &Vocab) -> Result<Vec<i64>, KokoroError> {
        let segments = Segments::parse(text);
        let encoded = self.encode_phrases(&segments.phrases, lang, vocab)?;

        let mut ids = Vec::new();
        for slot in &segments.slots {
            match *slot {
                Slot::Phrase(i) => ids.extend(encoded.get(i).into_iter().flatten()),
                Slot::Mark(mark) => ids.extend(vocab.id(mark)),
            }
        }
        Ok(ids)
    }

    /// One espeak run for all phrases, one line each. If espeak does not
    /// answer line for line, every phrase is run on its own.
    fn encode_phrases(
        &self,
        phrases: &[String],
        lang: &str,
        vocab: &Vocab,
    ) -> Result<Vec<Vec<i64>>, KokoroError> {
        if phrases.is_empty() {
            return Ok(Vec::new());
        }

        let output = self.run_espeak(&phrases.join("\n"), lang)?;
        let lines: Vec<&str> = output.lines().collect();
        if lines.len() == phrases.len() {
            return Ok(lines.into_iter().map(|line| vocab.encode(line)).collect());
        }

        log::debug!(
            "espeak-ng returned {} lines for {} phrases, retrying one by one",
            lines.len(),
            phrases.len()
        );
        phrases
            .iter()
            .map(|phrase| Ok(vocab.encode(&self.run_espeak(phrase, lang)?)))
            .collect()
    }

    fn run_espeak(&self, input: &str, lang: &str) -> Result<String, KokoroError> {
        let program = self
            .espeak
            .bin_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("espeak-ng"));
        let mut command = Command::new(program);
        command
            .args(["--ipa", "--stdin", "-q", "-v", lang])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(data) = &self.espeak.data_path {
            command.env("ESPEAK_DATA_PATH", data);
        }

        let mut child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => KokoroError::EspeakNotFound,
            _ => KokoroError::Io(e),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            // espeak reads line by line; an unterminated last line loses its final phoneme.
            stdin.write_all(input.as_bytes())?;
            if !input.ends_with('\n') {
                stdin.write_all(b"\n")?;
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(KokoroError::PhonemizerFailed(format!(
                "espeak-ng exited with code {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
