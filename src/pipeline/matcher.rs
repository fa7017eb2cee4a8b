/// True iff any configured keyword occurs verbatim (case-sensitive) in
/// `text`. An empty keyword set matches nothing.
pub fn matches(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|word| text.contains(word.as_str()))
}
