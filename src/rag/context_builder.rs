//! Formats retrieved cases into a bounded prompt context.

use crate::core::config::settings::DEFAULT_RESPONSE_EXCERPT_CHARS;

use super::index::CaseMatch;

const EXCERPT_MARKER: &str = "...";

/// Builds the "relevant examples" block of the generation prompt.
///
/// Each case contributes the patient context verbatim and an excerpt of
/// the counselor response capped at a fixed character count, so prompt
/// size stays bounded regardless of how long stored responses are.
/// Retrieval order is generation order; no deduplication or re-ranking.
pub struct ContextBuilder {
    response_excerpt_chars: usize,
}

impl ContextBuilder {
    pub fn new(response_excerpt_chars: usize) -> Self {
        Self {
            response_excerpt_chars,
        }
    }

    pub fn build_context(&self, cases: &[CaseMatch]) -> String {
        let mut context = String::new();

        for (i, case) in cases.iter().enumerate() {
            let excerpt: String = case
                .document
                .counselor_response
                .chars()
                .take(self.response_excerpt_chars)
                .collect();

            context.push_str(&format!("\n**Case {}:**\n", i + 1));
            context.push_str(&format!("Patient: {}\n", case.document.patient_context));
            context.push_str(&format!("Counselor: {}{}\n", excerpt, EXCERPT_MARKER));
        }

        context
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_EXCERPT_CHARS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::index::CaseDocument;

    fn case(doc_id: i64, patient: &str, counselor: &str, score: f32) -> CaseMatch {
        CaseMatch {
            document: CaseDocument {
                doc_id,
                patient_context: patient.to_string(),
                counselor_response: counselor.to_string(),
                response_length: counselor.chars().count() as i64,
            },
            score,
        }
    }

    #[test]
    fn empty_input_builds_empty_context() {
        let builder = ContextBuilder::default();
        assert_eq!(builder.build_context(&[]), "");
    }

    #[test]
    fn preserves_retrieval_order_and_labels_cases() {
        let builder = ContextBuilder::new(100);
        let cases = vec![
            case(0, "feels burned out", "suggest a schedule", 0.9),
            case(1, "cannot sleep", "sleep hygiene first", 0.7),
        ];

        let context = builder.build_context(&cases);

        let first = context.find("**Case 1:**").unwrap();
        let second = context.find("**Case 2:**").unwrap();
        assert!(first < second);
        assert!(context.contains("Patient: feels burned out"));
        assert!(context.contains("Counselor: sleep hygiene first..."));
    }

    #[test]
    fn long_responses_are_truncated_to_the_excerpt_bound() {
        let builder = ContextBuilder::new(500);
        let long_response = "a".repeat(600);
        let cases = vec![case(0, "patient", &long_response, 0.5)];

        let context = builder.build_context(&cases);

        let line = context
            .lines()
            .find(|line| line.starts_with("Counselor: "))
            .unwrap();
        let body = line.strip_prefix("Counselor: ").unwrap();
        assert_eq!(body.chars().count(), 500 + EXCERPT_MARKER.len());
        assert!(body.ends_with(EXCERPT_MARKER));
    }

    #[test]
    fn truncation_respects_multibyte_characters() {
        let builder = ContextBuilder::new(10);
        let response = "é".repeat(50);
        let cases = vec![case(0, "patient", &response, 0.5)];

        let context = builder.build_context(&cases);

        let line = context
            .lines()
            .find(|line| line.starts_with("Counselor: "))
            .unwrap();
        let body = line.strip_prefix("Counselor: ").unwrap();
        assert_eq!(body.chars().count(), 10 + EXCERPT_MARKER.len());
    }

    #[test]
    fn short_responses_keep_their_full_text() {
        let builder = ContextBuilder::new(500);
        let cases = vec![case(0, "patient", "short reply", 0.5)];

        let context = builder.build_context(&cases);
        assert!(context.contains("Counselor: short reply..."));
    }
}
