use crate::store::SnippetStore;

/// Scores every stored snippet against the query and returns the top `top_k`
/// snippets with a positive score, best first. Ties keep insertion order.
/// When nothing matches (or the query has no words), the first stored
/// snippet is returned alone so callers always have context to work with.
pub fn retrieve(store: &SnippetStore, query: &str, top_k: usize) -> Vec<String> {
    let snippets = store.snapshot();
    rank_snippets(snippets, query, top_k)
}

fn rank_snippets(snippets: Vec<String>, query: &str, top_k: usize) -> Vec<String> {
    let lowered = query.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    let fallback = snippets.first().cloned();

    let mut scored: Vec<(usize, String)> = snippets
        .into_iter()
        .map(|snippet| (overlap_score(&snippet, &words), snippet))
        .collect();

    // Stable sort: equal scores keep store order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(top_k);
    scored.retain(|(score, _)| *score > 0);

    if scored.is_empty() {
        return fallback.into_iter().collect();
    }

    scored.into_iter().map(|(_, snippet)| snippet).collect()
}

// ============ Scoring ============

/// Counts how many query words appear as substrings of the snippet,
/// case-insensitively. `words` comes straight from a whitespace split of
/// the query, so a word repeated in the query counts once per occurrence.
fn overlap_score(snippet: &str, words: &[&str]) -> usize {
    let haystack = snippet.to_lowercase();
    words.iter().filter(|word| haystack.contains(**word)).count()
}
