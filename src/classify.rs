//! Signal and text classification for the translation pipelines.
//!
//! Three cheap veto points sit in front of the expensive services:
//! - energy (RMS) gating per chunk and per finalized buffer
//! - zero-crossing-rate gating for unfiltered game audio
//! - hallucination / repetition detection on transcribed and translated text
//!
//! Everything here is a pure function or an immutable filter built from
//! injected configuration; there is no hidden state.

use crate::defaults;
use std::collections::HashSet;

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Returns
/// RMS value in the same scale as the input (0.0 to 1.0 for normalized
/// float audio). Returns 0.0 for empty input.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Returns the maximum absolute amplitude, 0.0 for empty input.
pub fn peak_amplitude(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |peak, &s| peak.max(s.abs()))
}

/// Zero-crossing rate: sign changes per sample pair (0.0 to 1.0).
///
/// A cheap proxy for spectral structure. Voiced speech sits in a narrow
/// band; steady tones fall below it, broadband noise above.
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }

    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();

    crossings as f32 / (samples.len() - 1) as f32
}

/// Decides whether a buffer plausibly contains speech.
///
/// Requires at least [`defaults::MIN_SPEECH_SECS`] of audio and RMS above
/// `rms_threshold`. When `filtered` is true the caller has already
/// band-limited the audio to the speech band, so energy alone suffices;
/// otherwise the zero-crossing rate must fall in the speech band as well,
/// which rejects tones, rumble, and broadband noise that pass the energy
/// gate but are not speech-shaped.
pub fn looks_like_speech(
    samples: &[f32],
    sample_rate: u32,
    rms_threshold: f32,
    filtered: bool,
) -> bool {
    if samples.len() < defaults::secs_to_samples(defaults::MIN_SPEECH_SECS, sample_rate) {
        return false;
    }

    if rms(samples) <= rms_threshold {
        return false;
    }

    if filtered {
        return true;
    }

    let zcr = zero_crossing_rate(samples);
    (defaults::ZCR_SPEECH_MIN..=defaults::ZCR_SPEECH_MAX).contains(&zcr)
}

/// Transcripts that speech models emit verbatim over silence or noise
/// (English and Russian). Matched exactly against the whole cleaned text.
const DENY_LIST: &[&str] = &[
    // English
    "you",
    "thank you",
    "thanks",
    "thanks for watching",
    "subtitles",
    "mbc",
    "copyright",
    "allô",
    "allo",
    "bye",
    "goodbye",
    "the end",
    "thank you for watching",
    "so",
    "i'm sorry",
    "oh",
    "ah",
    "hmm",
    "huh",
    "okay",
    "ok",
    "yes",
    "no",
    "yeah",
    "right",
    "elderman",
    "elder_man",
    "www",
    "http",
    "com",
    // Russian
    "субтитры",
    "продолжение следует",
    "спасибо",
    "спасибо за просмотр",
    "подписывайтесь",
    "до свидания",
    "конец",
    "редактор",
    "переводчик",
];

/// Boilerplate phrases that appear inside longer hallucinated lines
/// (subtitle credits, channel sign-offs, prompt leakage). Unlike the deny
/// list these are matched as contained phrases, so each entry must be
/// specific enough to never occur in real speech.
const BOILERPLATE_PATTERNS: &[&str] = &[
    "subtitles by",
    "subs by",
    "sync corrected",
    "please subscribe",
    "like and subscribe",
    "thanks for watching",
    "thank you for watching",
    "субтитры сделал",
    "субтитры создавал",
    "редактор субтитров",
    "продолжение следует",
    "спасибо за просмотр",
    "www.",
    "http://",
    "https://",
];

/// Punctuation stripped from the ends of a transcript before matching.
const TRIM_CHARS: &[char] = &[
    '.', '!', '?', ',', ';', ':', '…', ' ', '\t', '\n', '"', '\'',
];

/// Detector for model-generated text with no basis in the audio.
///
/// Built from immutable deny-list and pattern data injected at construction
/// so tests and per-locale variants can supply their own tables. Runs on
/// both raw transcripts and translated text, since either model can
/// hallucinate independently.
#[derive(Debug, Clone)]
pub struct HallucinationFilter {
    exact: HashSet<String>,
    patterns: Vec<String>,
}

impl HallucinationFilter {
    /// Creates a filter from explicit deny-list entries and boilerplate
    /// patterns. Entries are lowercased once here.
    pub fn new(exact: &[&str], patterns: &[&str]) -> Self {
        Self {
            exact: exact.iter().map(|e| e.to_lowercase()).collect(),
            patterns: patterns.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Returns true if the text is likely a model hallucination.
    pub fn is_hallucination(&self, text: &str) -> bool {
        let clean = text.trim().to_lowercase();
        let stripped = clean.trim_matches(TRIM_CHARS);

        if stripped.chars().count() < 3 {
            return true;
        }

        if self.exact.contains(stripped) {
            return true;
        }

        if self.patterns.iter().any(|p| stripped.contains(p.as_str())) {
            return true;
        }

        if is_phrase_repeated(stripped) {
            return true;
        }

        if dominant_word_fraction(stripped) {
            return true;
        }

        if degenerate_characters(stripped) {
            return true;
        }

        // Very short after removing spaces (filler fragments)
        if stripped.chars().filter(|c| !c.is_whitespace()).count() < 4 {
            return true;
        }

        false
    }
}

impl Default for HallucinationFilter {
    fn default() -> Self {
        Self::new(DENY_LIST, BOILERPLATE_PATTERNS)
    }
}

/// True when the text is a short phrase (2-15 chars) repeated three or more
/// times, allowing whitespace and light punctuation between repeats.
/// Catches loops like "субтитры субтитры субтитры".
fn is_phrase_repeated(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    if n < 6 {
        return false;
    }

    let is_separator = |c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?');
    let max_len = 15.min(n / 3);

    'candidate: for plen in 2..=max_len {
        let phrase = &chars[..plen];
        if phrase.iter().all(|&c| is_separator(c)) {
            continue;
        }

        let mut pos = plen;
        let mut repeats = 1;
        while pos < n {
            while pos < n && is_separator(chars[pos]) {
                pos += 1;
            }
            if pos == n {
                break;
            }
            if pos + plen <= n && chars[pos..pos + plen] == *phrase {
                repeats += 1;
                pos += plen;
            } else {
                continue 'candidate;
            }
        }

        if repeats >= 3 {
            return true;
        }
    }

    false
}

/// True for four or more words where one word dominates: the distinct-word
/// fraction is at or below 20%.
fn dominant_word_fraction(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < 4 {
        return false;
    }

    let distinct: HashSet<&str> = words.iter().copied().collect();
    distinct.len() <= (words.len() / 5).max(1)
}

/// True for long strings where one character dominates (>= 75% of
/// non-whitespace characters) or character variety collapses entirely.
fn degenerate_characters(text: &str) -> bool {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    let total = chars.len();
    if total < 12 {
        return false;
    }

    let mut counts: std::collections::HashMap<char, usize> = std::collections::HashMap::new();
    for &c in &chars {
        *counts.entry(c).or_insert(0) += 1;
    }

    let max_count = counts.values().copied().max().unwrap_or(0);
    if max_count * 4 >= total * 3 {
        return true;
    }

    // Low variety over a long span, e.g. "ахахахахахахахахахахахахахаха"
    total >= 30 && counts.len() <= 3
}

/// Detects translation-model degeneracy in translated output.
///
/// Distinct from transcription hallucination: the transcript may be fine
/// while the translator loops. Flags six or more occurrences of any single
/// word, or (at four words and up) the two most frequent words jointly
/// exceeding 60% of the word count.
pub fn is_repetitive_translation(text: &str) -> bool {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| w.trim_matches(TRIM_CHARS).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();

    if words.is_empty() {
        return false;
    }

    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for w in &words {
        *counts.entry(w.as_str()).or_insert(0) += 1;
    }

    let mut frequencies: Vec<usize> = counts.values().copied().collect();
    frequencies.sort_unstable_by(|a, b| b.cmp(a));

    if frequencies[0] >= 6 {
        return true;
    }

    if words.len() >= 4 {
        let top_two = frequencies[0] + frequencies.get(1).copied().unwrap_or(0);
        if top_two * 10 > words.len() * 6 {
            return true;
        }
    }

    false
}
