//! Linear undo/redo history of source-text edits.

#[derive(Debug, Default, Clone)]
pub struct EditHistory {
    entries: Vec<String>,
    index: Option<usize>,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append after the current position, dropping any redo entries.
    pub fn record(&mut self, text: &str) {
        let keep = self.index.map(|i| i + 1).unwrap_or(0);
        self.entries.truncate(keep);
        self.entries.push(text.to_string());
        self.index = Some(self.entries.len() - 1);
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.index, Some(i) if i > 0)
    }

    pub fn can_redo(&self) -> bool {
        match self.index {
            Some(i) => i + 1 < self.entries.len(),
            None => false,
        }
    }

    pub fn undo(&mut self) -> Option<&str> {
        let i = self.index.filter(|&i| i > 0)? - 1;
        self.index = Some(i);
        Some(&self.entries[i])
    }

    pub fn redo(&mut self) -> Option<&str> {
        if !self.can_redo() {
            return None;
        }
        let i = self.index.map(|i| i + 1)?;
        self.index = Some(i);
        Some(&self.entries[i])
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = None;
    }
}
