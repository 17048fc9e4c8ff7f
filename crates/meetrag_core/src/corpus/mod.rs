use sha2::{Digest, Sha256};

use crate::domain::MeetingAnalysis;

/// Flattened, labeled text for one meeting. Regenerated on every index build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingCorpusDocument {
    pub text: String,
    pub text_sha256: String,
}

impl MeetingCorpusDocument {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Build the corpus document in a fixed section order:
/// transcript, key points, action items, participants, follow-ups, dates, next steps, summary.
pub fn build_corpus(analysis: &MeetingAnalysis) -> MeetingCorpusDocument {
    let sections = [
        labeled_block("Full Transcript:", &analysis.transcript),
        bulleted("Key Points:", &analysis.key_points),
        bulleted("Action Items:", &analysis.action_items),
        format!("Participants: {}", analysis.participants.join(", "))
            .trim_end()
            .to_string(),
        bulleted("Follow-up Items:", &analysis.follow_up),
        bulleted("Important Dates:", &analysis.dates),
        labeled_block("Next Steps:", &analysis.next_steps),
        labeled_block("Meeting Summary:", &analysis.summary),
    ];
    let text = sections.join("\n\n");
    let text_sha256 = hex::encode(Sha256::digest(text.as_bytes()));
    MeetingCorpusDocument { text, text_sha256 }
}

fn labeled_block(label: &str, body: &str) -> String {
    if body.is_empty() {
        return label.to_string();
    }
    format!("{label}\n{body}")
}

fn bulleted(label: &str, items: &[String]) -> String {
    let mut lines = Vec::with_capacity(items.len() + 1);
    lines.push(label.to_string());
    for item in items {
        lines.push(format!("- {item}"));
    }
    lines.join("\n")
}
