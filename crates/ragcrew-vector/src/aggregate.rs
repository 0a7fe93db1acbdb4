/// Join each query's hit texts, in rank order, into one context string.
/// A query with no hits yields an empty string.
pub fn aggregate(ranked: Vec<Vec<String>>) -> Vec<String> {
    ranked.into_iter().map(|hits| hits.join("\n")).collect()
}
