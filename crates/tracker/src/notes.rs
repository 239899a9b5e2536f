//! Congratulation notes attached to completions.

use rand::seq::SliceRandom;

const DEFAULT_NOTES: &[&str] = &[
    "Well done, see you tomorrow!",
    "Another day in the bank.",
    "Consistency beats intensity.",
    "The streak grows. Keep it up!",
    "Small steps, every single day.",
    "Done and dusted.",
    "Future you says thanks.",
];

/// Picks a random note for each new completion.
#[derive(Debug, Clone)]
pub struct NotePicker {
    notes: Vec<String>,
}

impl Default for NotePicker {
    fn default() -> Self {
        Self::new(DEFAULT_NOTES.iter().map(|s| s.to_string()).collect())
    }
}

impl NotePicker {
    /// Create a picker over `notes`. Blank entries are dropped.
    pub fn new(notes: Vec<String>) -> Self {
        let notes = notes
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Self { notes }
    }

    /// A random note, or `None` if the list is empty.
    pub fn pick(&self) -> Option<String> {
        let mut rng = rand::thread_rng();
        self.notes.choose(&mut rng).cloned()
    }

    /// Every configured note.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}
