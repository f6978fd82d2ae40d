//! Navigation history: a linear stack of visited URLs and a cursor.

use gemway_types::GeminiUrl;

/// Visited URLs in order, plus the position of the displayed one.
///
/// Unlike a browser's back/forward pair of stacks this keeps a single
/// vector so an entry can be rewritten in place when a replay redirects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStack {
    entries: Vec<GeminiUrl>,
    current: Option<usize>,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current index, or `-1` when the history is empty.
    pub fn index(&self) -> isize {
        self.current.map_or(-1, |i| i as isize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[GeminiUrl] {
        &self.entries
    }

    pub fn current(&self) -> Option<&GeminiUrl> {
        self.current.map(|i| &self.entries[i])
    }

    pub fn get(&self, index: usize) -> Option<&GeminiUrl> {
        self.entries.get(index)
    }

    /// Record a completed navigation.
    ///
    /// Drops everything after the current entry, then appends `url`
    /// unless it equals the current entry.
    pub fn push(&mut self, url: GeminiUrl) {
        if let Some(i) = self.current {
            self.entries.truncate(i + 1);
            if self.entries[i] == url {
                return;
            }
        } else {
            self.entries.clear();
        }
        self.entries.push(url);
        self.current = Some(self.entries.len() - 1);
    }

    /// Overwrite the entry at `index`. Out-of-range indices are ignored.
    pub fn replace_at(&mut self, index: usize, url: GeminiUrl) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = url;
        }
    }

    /// Move the cursor to an existing entry.
    pub fn move_to(&mut self, index: usize) -> bool {
        if index < self.entries.len() {
            self.current = Some(index);
            true
        } else {
            false
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.current.is_some_and(|i| i > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        self.current.is_some_and(|i| i + 1 < self.entries.len())
    }

    /// Index and URL one step back, if any.
    pub fn back_target(&self) -> Option<(usize, &GeminiUrl)> {
        let i = self.current?.checked_sub(1)?;
        Some((i, &self.entries[i]))
    }

    /// Index and URL one step forward, if any.
    pub fn forward_target(&self) -> Option<(usize, &GeminiUrl)> {
        let i = self.current? + 1;
        self.entries.get(i).map(|url| (i, url))
    }
}
