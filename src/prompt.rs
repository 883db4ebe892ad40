/// Builds the generation prompt from retrieved context and the user query.
/// Context lines are joined with newlines in the order the caller provides;
/// callers that accept extra context prepend it before calling.
pub fn build_rag_prompt(query: &str, context: &[String]) -> String {
    format!(
        "You are a RAG-style assistant. Use ONLY the context below.\n\n\
         Context:\n{}\n\n\
         Question: {}\n\
         Answer clearly and mention which context you used.",
        context.join("\n"),
        query
    )
}

pub fn build_summary_prompt(text: &str) -> String {
    format!("Summarize the following text in 3-5 bullet points.\n\nText:\n{text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rag_prompt_joins_context_in_order() {
        let context = vec!["first snippet".to_string(), "second snippet".to_string()];
        let prompt = build_rag_prompt("what is this?", &context);
        assert_eq!(
            prompt,
            "You are a RAG-style assistant. Use ONLY the context below.\n\n\
             Context:\nfirst snippet\nsecond snippet\n\n\
             Question: what is this?\n\
             Answer clearly and mention which context you used."
        );
    }

    #[test]
    fn test_rag_prompt_orders_context_before_question() {
        let context = vec!["ctx".to_string()];
        let prompt = build_rag_prompt("q", &context);
        let ctx_pos = prompt.find("Context:").unwrap();
        let q_pos = prompt.find("Question:").unwrap();
        assert!(ctx_pos < q_pos);
    }

    #[test]
    fn test_summary_prompt_embeds_text_verbatim() {
        let prompt = build_summary_prompt("line one\nline two");
        assert!(prompt.starts_with("Summarize the following text in 3-5 bullet points."));
        assert!(prompt.ends_with("Text:\nline one\nline two"));
    }
}
