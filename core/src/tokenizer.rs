use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref DEFAULT_STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Turns raw text into the normalized (term, position) stream the index is
/// built from: NFKC, lowercase, stop-word removal, Snowball stemming.
pub struct Analyzer {
    stopwords: HashSet<String>,
    stemmer: Stemmer,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(DEFAULT_STOPWORDS.iter().map(|w| w.to_string()).collect())
    }
}

impl Analyzer {
    pub fn new(stopwords: HashSet<String>) -> Self {
        Self { stopwords, stemmer: Stemmer::create(Algorithm::English) }
    }

    /// Build an analyzer from a stop-word list file, one word per line.
    /// Blank lines are ignored; words are lowercased.
    pub fn from_stopwords_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading stop-word list {}", path.as_ref().display()))?;
        let words = text
            .lines()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();
        Ok(Self::new(words))
    }

    /// Tokenize text into (term, position) pairs.
    ///
    /// Positions index the token stream before stop-word removal, so a
    /// removed token leaves its slot vacant and the output positions may be
    /// non-contiguous. Text with no surviving tokens yields an empty vec.
    pub fn analyze(&self, text: &str) -> Vec<(String, usize)> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut tokens = Vec::new();
        for (pos, mat) in RE.find_iter(&normalized).enumerate() {
            let token = mat.as_str();
            if self.stopwords.contains(token) {
                continue;
            }
            tokens.push((self.stemmer.stem(token).to_string(), pos));
        }
        tokens
    }

    /// Normalize a single query term with the same case folding and stemming
    /// applied at index time. Stop words are not filtered here; a stop-word
    /// term simply never occurs in the index and matches nothing.
    ///
    /// Returns `None` when the input contains no word characters.
    pub fn normalize_term(&self, raw: &str) -> Option<String> {
        let normalized = raw.nfkc().collect::<String>().to_lowercase();
        let mat = RE.find(&normalized)?;
        Some(self.stemmer.stem(mat.as_str()).to_string())
    }
}
