//! Trigger-word lookup for dialogue branching
//!
//! The state machine never hard-codes vocabulary. Instrument markers, skip
//! words and reset words are injected here so a deployment can be localized
//! without touching the branching logic. All matching is case-insensitive.

/// Configurable trigger-word sets, one per semantic role
#[derive(Debug, Clone, PartialEq)]
pub struct Lexicon {
    instrument_markers: Vec<String>,
    skip_words: Vec<String>,
    reset_words: Vec<String>,
}

impl Lexicon {
    /// Markers that begin the instrument-error part of a measurement message
    pub const DEFAULT_INSTRUMENT_MARKERS: &'static [&'static str] = &[
        "багаж",
        "төхөөрөмж",
        "масштаб",
        "instrument",
        "device",
        "scale",
    ];

    /// Words that skip the instrument error
    pub const DEFAULT_SKIP_WORDS: &'static [&'static str] = &[
        "алгас",
        "мэдэхгүй",
        "байхгүй",
        "skip",
        "unknown",
        "none",
    ];

    /// Whole-message reset requests
    pub const DEFAULT_RESET_WORDS: &'static [&'static str] =
        &["/reset", "/new", "reset", "new calculation", "шинэ тооцоо"];

    /// Build a lexicon; words are lowercased and blanks are dropped
    pub fn new<'a>(
        instrument_markers: impl IntoIterator<Item = &'a str>,
        skip_words: impl IntoIterator<Item = &'a str>,
        reset_words: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            instrument_markers: normalize(instrument_markers),
            skip_words: normalize(skip_words),
            reset_words: normalize(reset_words),
        }
    }

    /// Byte offset in `text` where the earliest instrument marker starts
    ///
    /// When several markers occur, the one closest to the start of the text
    /// wins regardless of its position in the marker list.
    pub fn find_instrument_marker(&self, text: &str) -> Option<usize> {
        let (lowered, origin) = lowercase_with_offsets(text);

        self.instrument_markers
            .iter()
            .filter_map(|marker| lowered.find(marker.as_str()))
            .min()
            .map(|pos| origin[pos])
    }

    /// Whether `text` asks to skip the instrument error
    pub fn is_skip(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.skip_words.iter().any(|w| lowered.contains(w.as_str()))
    }

    /// Whether the whole message is a reset request
    pub fn is_reset(&self, text: &str) -> bool {
        let lowered = text.trim().to_lowercase();
        self.reset_words.iter().any(|w| *w == lowered)
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_INSTRUMENT_MARKERS.iter().copied(),
            Self::DEFAULT_SKIP_WORDS.iter().copied(),
            Self::DEFAULT_RESET_WORDS.iter().copied(),
        )
    }
}

fn normalize<'a>(words: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    words
        .into_iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Lowercase `text`, keeping for every byte of the result the byte offset
/// of the original character it came from
///
/// Lowercasing can change a character's encoded length, so offsets found in
/// the lowered text cannot be used on the original directly.
fn lowercase_with_offsets(text: &str) -> (String, Vec<usize>) {
    let mut lowered = String::with_capacity(text.len());
    let mut origin = Vec::with_capacity(text.len());

    for (idx, ch) in text.char_indices() {
        for lower in ch.to_lowercase() {
            let start = lowered.len();
            lowered.push(lower);
            origin.extend(std::iter::repeat(idx).take(lowered.len() - start));
        }
    }

    (lowered, origin)
}
