//! Thumbnail URL construction.
//!
//! MediaWiki serves scaled assets from a parallel `/thumb` tree: the
//! directory prefix up to the repo root gains a `thumb` segment and the
//! original filename becomes a directory containing `<res>-<filename>`.
//! Vector sources are rasterized by appending `.png` to the scaled name.

/// Extensions whose scaled asset gets a forced `.png` suffix.
const VECTOR_EXTENSIONS: &[&str] = &["svg"];

/// File extension (after the last `.`), lowercased.
pub fn extension_of(url: &str) -> String {
    match url.rfind('.') {
        Some(i) => url[i + 1..].to_lowercase(),
        None => String::new(),
    }
}

/// Rewrite an asset URL to the given resolution token.
///
/// An empty token means the unscaled original and returns the URL
/// unchanged. A URL without enough path segments passes through untouched.
pub fn assign_resolution(url: &str, resolution: &str) -> String {
    if resolution.is_empty() {
        return url.to_string();
    }

    // Byte offset of the 5th '/' from the start of the URL.
    let Some(insert_at) = url
        .char_indices()
        .filter(|&(_, c)| c == '/')
        .map(|(i, _)| i)
        .nth(4)
    else {
        return url.to_string();
    };

    let mut rewritten = format!("{}/thumb{}", &url[..insert_at], &url[insert_at..]);
    let filename = match rewritten.rfind('/') {
        Some(i) => rewritten[i + 1..].to_string(),
        None => rewritten.clone(),
    };
    rewritten.push('/');
    rewritten.push_str(resolution);
    rewritten.push('-');
    rewritten.push_str(&filename);

    if VECTOR_EXTENSIONS.contains(&extension_of(&rewritten).as_str()) {
        rewritten.push_str(".png");
    }
    rewritten
}
