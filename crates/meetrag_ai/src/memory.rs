use meetrag_core::domain::Turn;

/// Ordered question/answer turns for one meeting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn {
            question: question.into(),
            answer: answer.into(),
        });
    }

    pub fn history(&self) -> &[Turn] {
        &self.turns
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns[skip..].to_vec()
    }

    /// Remove every turn. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let n = self.turns.len();
        self.turns.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
