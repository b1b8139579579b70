//! Working memory fed to the planner as context.

/// Textual memory: append entries, read back a bounded recent window.
pub trait Memory {
    fn append(&mut self, text: &str);

    /// The `limit` most recent entries, oldest first, newline-separated.
    fn build_context(&self, limit: usize) -> String;
}

/// In-process memory for a single run.
#[derive(Debug, Clone, Default)]
pub struct WorkingMemory {
    entries: Vec<String>,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Memory for WorkingMemory {
    fn append(&mut self, text: &str) {
        self.entries.push(text.to_string());
    }

    fn build_context(&self, limit: usize) -> String {
        let start = self.entries.len().saturating_sub(limit);
        self.entries[start..].join("\n")
    }
}
