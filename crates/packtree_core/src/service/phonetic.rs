//! Phonetic transcription enrichment.
//!
//! # Responsibility
//! - Define the lookup seam for an external pronunciation dictionary.
//! - Pace lookups and degrade every failure to an empty transcription.
//!
//! # Invariants
//! - Enrichment never fails an import; a miss yields `""`.
//! - Consecutive lookups are at least `delay` apart.

use log::warn;
use std::cell::Cell;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

/// Default pause between two lookups.
pub const DEFAULT_LOOKUP_DELAY: Duration = Duration::from_millis(100);

/// Lookup failures; all of them are recoverable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentError {
    /// Dictionary has no entry for the word.
    NotFound(String),
    /// Dictionary could not be reached or answered garbage.
    Unavailable(String),
}

impl Display for EnrichmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(word) => write!(f, "no phonetic entry for `{word}`"),
            Self::Unavailable(message) => write!(f, "phonetic lookup unavailable: {message}"),
        }
    }
}

impl Error for EnrichmentError {}

/// Source of phonetic transcriptions.
pub trait PhoneticLookup {
    fn lookup(&self, word: &str) -> Result<String, EnrichmentError>;
}

impl<T: PhoneticLookup + ?Sized> PhoneticLookup for &T {
    fn lookup(&self, word: &str) -> Result<String, EnrichmentError> {
        (**self).lookup(word)
    }
}

impl<T: PhoneticLookup + ?Sized> PhoneticLookup for Box<T> {
    fn lookup(&self, word: &str) -> Result<String, EnrichmentError> {
        (**self).lookup(word)
    }
}

/// Lookup that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPhoneticLookup;

impl PhoneticLookup for NoPhoneticLookup {
    fn lookup(&self, word: &str) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::NotFound(word.to_string()))
    }
}

/// Lookup backed by a preloaded word → transcription table.
///
/// Words are matched case-insensitively after trimming.
#[derive(Debug, Clone, Default)]
pub struct TablePhoneticLookup {
    entries: HashMap<String, String>,
}

impl TablePhoneticLookup {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(word, phonetic)| (normalize_word(&word), phonetic))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PhoneticLookup for TablePhoneticLookup {
    fn lookup(&self, word: &str) -> Result<String, EnrichmentError> {
        self.entries
            .get(&normalize_word(word))
            .cloned()
            .ok_or_else(|| EnrichmentError::NotFound(word.to_string()))
    }
}

fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Paced, failure-tolerant wrapper around a [`PhoneticLookup`].
pub struct PhoneticEnricher<L: PhoneticLookup> {
    lookup: L,
    delay: Duration,
    last_call: Cell<Option<Instant>>,
}

impl<L: PhoneticLookup> PhoneticEnricher<L> {
    pub fn new(lookup: L) -> Self {
        Self::with_delay(lookup, DEFAULT_LOOKUP_DELAY)
    }

    pub fn with_delay(lookup: L, delay: Duration) -> Self {
        Self {
            lookup,
            delay,
            last_call: Cell::new(None),
        }
    }

    /// Returns the transcription of `word`, or `""` on any failure.
    pub fn enrich(&self, word: &str) -> String {
        if word.trim().is_empty() {
            return String::new();
        }
        self.pace();
        let outcome = self.lookup.lookup(word);
        self.last_call.set(Some(Instant::now()));

        match outcome {
            Ok(phonetic) => phonetic.trim().to_string(),
            Err(EnrichmentError::NotFound(_)) => String::new(),
            Err(err) => {
                warn!("event=phonetic_lookup module=import status=error error={err}");
                String::new()
            }
        }
    }

    fn pace(&self) {
        if self.delay.is_zero() {
            return;
        }
        if let Some(last_call) = self.last_call.get() {
            let elapsed = last_call.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
    }
}
