//! In-memory browser-style history stack.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

/// Ordered entries with a cursor. Pushing drops any forward entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct History {
    entries: Vec<String>,
    cursor: usize,
}

impl History {
    #[must_use]
    pub fn new(initial: impl Into<String>) -> Self {
        Self { entries: vec![initial.into()], cursor: 0 }
    }

    pub fn push(&mut self, path: impl Into<String>) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(path.into());
        self.cursor = self.entries.len() - 1;
    }

    /// Overwrite the current entry in place.
    pub fn replace(&mut self, path: impl Into<String>) {
        self.entries[self.cursor] = path.into();
    }

    /// Step back one entry. Returns the new current path, or `None` at the start.
    pub fn back(&mut self) -> Option<&str> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    #[must_use]
    pub fn current(&self) -> &str {
        &self.entries[self.cursor]
    }

    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
