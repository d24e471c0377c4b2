use graph::EmbeddingRecord;

/// Cosine similarity, or `None` when the score is undefined: mismatched
/// dimensions or a zero-magnitude vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let magnitude_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return None;
    }

    Some(dot / (magnitude_a * magnitude_b))
}

/// Rank stored nodes by similarity to the query vector, descending, and
/// take the top `k`. Undefined scores are dropped before ranking; equal
/// scores keep their original embedding order (stable sort).
pub fn top_k_nodes<'a>(
    query: &[f32],
    records: &'a [EmbeddingRecord],
    k: usize,
) -> Vec<&'a str> {
    let mut scored: Vec<(usize, f32)> = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            cosine_similarity(query, &record.embedding).map(|score| (index, score))
        })
        .collect();

    // Scores are finite here, so the comparison never actually falls back.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(k)
        .map(|(index, _)| records[index].node.as_str())
        .collect()
}
