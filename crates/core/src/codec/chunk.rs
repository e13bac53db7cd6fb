// Payload chunking on char boundaries

/// Split `payload` into pieces of at most `max_chars` characters.
///
/// Concatenating the result reproduces `payload` exactly. An empty payload
/// yields a single empty chunk so every snapshot has at least one carrier.
pub fn split(payload: &str, max_chars: usize) -> Vec<String> {
    debug_assert!(max_chars > 0);

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in payload.chars() {
        if count == max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    chunks.push(current);
    chunks
}

/// Concatenate chunks in order
pub fn join<S: AsRef<str>>(chunks: &[S]) -> String {
    chunks.iter().map(AsRef::as_ref).collect()
}
