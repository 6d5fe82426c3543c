//! Extraction of `<think>` blocks embedded in plain text content
//!
//! Some OpenAI-compatible servers stream reasoning inline as
//! `<think>...</think>` instead of a dedicated field. Tags may be split
//! across deltas, so a possible partial tag is held back until the next
//! fragment arrives.

use crate::types::StreamEvent;

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// Incremental splitter for inline reasoning tags
#[derive(Debug, Default)]
pub struct ThinkTagExtractor {
    inside: bool,
    pending: String,
}

impl ThinkTagExtractor {
    /// Feed a content fragment, returning text and reasoning events
    pub fn push(&mut self, fragment: &str) -> Vec<StreamEvent> {
        self.pending.push_str(fragment);
        let mut events = Vec::new();

        loop {
            let tag = if self.inside { CLOSE_TAG } else { OPEN_TAG };

            if let Some(pos) = self.pending.find(tag) {
                let before: String = self.pending.drain(..pos).collect();
                self.emit(before, &mut events);
                self.pending.drain(..tag.len());

                if self.inside {
                    events.push(StreamEvent::ReasoningEnd);
                }
                self.inside = !self.inside;
                continue;
            }

            let held = partial_tag_len(&self.pending, tag);
            let ready = self.pending.len() - held;
            let text: String = self.pending.drain(..ready).collect();
            self.emit(text, &mut events);
            break;
        }

        events
    }

    /// Flush anything held back at the end of the stream
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.pending);
        self.emit(rest, &mut events);
        events
    }

    fn emit(&self, text: String, events: &mut Vec<StreamEvent>) {
        if text.is_empty() {
            return;
        }

        events.push(if self.inside {
            StreamEvent::ReasoningDelta(text)
        } else {
            StreamEvent::TextDelta(text)
        });
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `tag`
fn partial_tag_len(text: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&n| text.ends_with(&tag[..n]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(fragments: &[&str]) -> Vec<StreamEvent> {
        let mut extractor = ThinkTagExtractor::default();
        let mut events: Vec<StreamEvent> = fragments.iter().flat_map(|f| extractor.push(f)).collect();
        events.extend(extractor.finish());
        events
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(run(&["hello ", "world"]), vec![
            StreamEvent::TextDelta("hello ".to_owned()),
            StreamEvent::TextDelta("world".to_owned()),
        ]);
    }

    #[test]
    fn whole_block_in_one_fragment() {
        assert_eq!(run(&["<think>plan</think>answer"]), vec![
            StreamEvent::ReasoningDelta("plan".to_owned()),
            StreamEvent::ReasoningEnd,
            StreamEvent::TextDelta("answer".to_owned()),
        ]);
    }

    #[test]
    fn tags_split_across_fragments() {
        assert_eq!(run(&["<thi", "nk>step one", " and two</th", "ink>", "done"]), vec![
            StreamEvent::ReasoningDelta("step one".to_owned()),
            StreamEvent::ReasoningDelta(" and two".to_owned()),
            StreamEvent::ReasoningEnd,
            StreamEvent::TextDelta("done".to_owned()),
        ]);
    }

    #[test]
    fn lone_angle_bracket_is_released_at_finish() {
        assert_eq!(run(&["a <", "b"]), vec![
            StreamEvent::TextDelta("a ".to_owned()),
            StreamEvent::TextDelta("<b".to_owned()),
        ]);
        assert_eq!(run(&["x <"]), vec![
            StreamEvent::TextDelta("x ".to_owned()),
            StreamEvent::TextDelta("<".to_owned()),
        ]);
    }

    #[test]
    fn unterminated_block_stays_reasoning() {
        assert_eq!(run(&["<think>still going"]), vec![StreamEvent::ReasoningDelta(
            "still going".to_owned()
        )]);
    }
}
