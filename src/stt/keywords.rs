//! Keyword-list and pronunciation-dictionary parsing, plus transcript
//! matching.
//!
//! Both file formats follow the usual keyword-spotting conventions:
//!
//! ```text
//! # keywords.list: one phrase per line, optional /threshold/
//! hey computer /1e-20/
//! lights on    /1e-10/
//! stop
//!
//! # words.dict: word followed by its phones; "(n)" marks variants
//! computer  K AH M P Y UW T ER
//! hey       HH EY
//! lights    L AY T S
//! on        AA N
//! on(2)     AO N
//! ```

use std::collections::HashSet;
use std::path::Path;

use super::engine::SttError;

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/// Lower-case `text`, turn punctuation into spaces and collapse whitespace.
///
/// ```
/// use kws_runner::stt::normalize;
///
/// assert_eq!(normalize("  Hey, Computer!  "), "hey computer");
/// ```
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '\'' {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// KeywordList
// ---------------------------------------------------------------------------

/// One entry of the keyword list.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    /// Normalised phrase (lower case, single spaces).
    pub phrase: String,
    /// Detection threshold, when the file specifies one.
    pub threshold: Option<f64>,
}

/// The set of phrases an engine listens for.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordList {
    keywords: Vec<Keyword>,
}

impl KeywordList {
    /// Parse keyword-list text.
    ///
    /// # Errors
    ///
    /// [`SttError::KeywordList`] when a threshold is malformed or when no
    /// phrase remains after skipping blanks and `#` comments.
    pub fn parse(text: &str) -> Result<Self, SttError> {
        let mut keywords = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (phrase, threshold) = match line.find('/') {
                Some(start) => {
                    let rest = &line[start + 1..];
                    let end = rest.find('/').ok_or_else(|| {
                        SttError::KeywordList(format!("line {}: unterminated threshold", index + 1))
                    })?;
                    let value = rest[..end].trim().parse::<f64>().map_err(|e| {
                        SttError::KeywordList(format!("line {}: bad threshold: {e}", index + 1))
                    })?;
                    (&line[..start], Some(value))
                }
                None => (line, None),
            };

            let phrase = normalize(phrase);
            if phrase.is_empty() {
                return Err(SttError::KeywordList(format!(
                    "line {}: threshold without a phrase",
                    index + 1
                )));
            }
            keywords.push(Keyword { phrase, threshold });
        }

        if keywords.is_empty() {
            return Err(SttError::KeywordList("no keywords defined".into()));
        }
        Ok(Self { keywords })
    }

    /// Read and parse a keyword-list file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SttError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SttError::KeywordList(format!("{}: {e}", path.display())))?;
        Self::parse(&text)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.iter()
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// The keyword spoken earliest in `transcript`, matched on whole words.
    ///
    /// When two phrases start at the same word the longer one wins, so
    /// "lights on" beats "lights".
    pub fn find_in(&self, transcript: &str) -> Option<&str> {
        let padded = format!(" {} ", normalize(transcript));

        self.keywords
            .iter()
            .filter_map(|k| {
                padded
                    .find(&format!(" {} ", k.phrase))
                    .map(|pos| (pos, k.phrase.as_str()))
            })
            .min_by(|(pa, a), (pb, b)| pa.cmp(pb).then(b.len().cmp(&a.len())))
            .map(|(_, phrase)| phrase)
    }

    /// Words used by the keyword phrases that `dictionary` does not know.
    pub fn missing_from<'a>(&'a self, dictionary: &Dictionary) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        self.keywords
            .iter()
            .flat_map(|k| k.phrase.split(' '))
            .filter(|w| !dictionary.contains(w) && seen.insert(*w))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Dictionary
// ---------------------------------------------------------------------------

/// Words known to the pronunciation dictionary.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    words: HashSet<String>,
}

impl Dictionary {
    pub fn parse(text: &str) -> Self {
        let words = text
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .filter(|word| !word.starts_with('#'))
            .map(|word| {
                // "read(2)" is the second pronunciation of "read".
                let base = word.split('(').next().unwrap_or(word);
                base.to_lowercase()
            })
            .filter(|word| !word.is_empty())
            .collect();
        Self { words }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SttError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SttError::Dictionary(format!("{}: {e}", path.display())))?;
        Ok(Self::parse(&text))
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const KEYWORDS: &str = "\
# wake words
hey computer /1e-20/
lights on /1e-10/
lights
  Stop
";

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("Lights, ON."), "lights on");
        assert_eq!(normalize("don't   stop"), "don't stop");
        assert_eq!(normalize("..."), "");
    }

    // ---- KeywordList::parse ------------------------------------------------

    #[test]
    fn parse_reads_phrases_and_thresholds() {
        let list = KeywordList::parse(KEYWORDS).unwrap();
        let entries: Vec<_> = list.iter().collect();

        assert_eq!(list.len(), 4);
        assert_eq!(entries[0].phrase, "hey computer");
        assert_eq!(entries[0].threshold, Some(1e-20));
        assert_eq!(entries[2].phrase, "lights");
        assert_eq!(entries[2].threshold, None);
        assert_eq!(entries[3].phrase, "stop");
    }

    #[test]
    fn parse_rejects_empty_list() {
        let err = KeywordList::parse("# nothing here\n\n").unwrap_err();
        assert!(matches!(err, SttError::KeywordList(_)));
    }

    #[test]
    fn parse_rejects_bad_threshold() {
        assert!(KeywordList::parse("hello /abc/").is_err());
        assert!(KeywordList::parse("hello /1e-5").is_err());
        assert!(KeywordList::parse("/1e-5/").is_err());
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let err = KeywordList::load("/nonexistent/keywords.list").unwrap_err();
        assert!(err.to_string().contains("keywords.list"));
    }

    // ---- KeywordList::find_in ----------------------------------------------

    #[test]
    fn find_in_matches_whole_words_only() {
        let list = KeywordList::parse("stop").unwrap();
        assert_eq!(list.find_in("Please STOP now."), Some("stop"));
        assert_eq!(list.find_in("unstoppable"), None);
    }

    #[test]
    fn find_in_prefers_earliest_then_longest() {
        let list = KeywordList::parse(KEYWORDS).unwrap();
        assert_eq!(list.find_in("stop, hey computer"), Some("stop"));
        assert_eq!(list.find_in("turn the lights on"), Some("lights on"));
        assert_eq!(list.find_in("the lights are off"), Some("lights"));
        assert_eq!(list.find_in("good morning"), None);
    }

    // ---- Dictionary --------------------------------------------------------

    #[test]
    fn dictionary_strips_variant_markers() {
        let dict = Dictionary::parse("on AA N\non(2) AO N\nHey HH EY\n\n");
        assert_eq!(dict.len(), 2);
        assert!(dict.contains("on"));
        assert!(dict.contains("hey"));
    }

    #[test]
    fn missing_words_are_reported_once() {
        let list = KeywordList::parse(KEYWORDS).unwrap();
        let dict = Dictionary::parse("hey HH EY\nlights L AY T S\non AA N\n");
        assert_eq!(list.missing_from(&dict), vec!["computer", "stop"]);
    }
}
