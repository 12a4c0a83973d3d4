use url::Url;

const UPLOAD_HOST: &str = "upload.wikimedia.org";
const COMMONS_PAGE_PREFIX: &str = "https://commons.wikimedia.org/wiki/File:";

/// Turns a direct Commons upload URL into the file's description page.
///
/// `https://upload.wikimedia.org/wikipedia/commons/a/ab/Logo.png` and its
/// `/thumb/.../120px-Logo.png` variants become
/// `https://commons.wikimedia.org/wiki/File:Logo.png`. Any other URL,
/// including an already converted one, is returned unchanged.
pub fn convert_to_commons_page_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    if url.host_str() != Some(UPLOAD_HOST) {
        return trimmed.to_string();
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let file_name = match segments.as_slice() {
        ["wikipedia", "commons", "thumb", _, _, file, _thumb] => Some(*file),
        ["wikipedia", "commons", _, _, file] => Some(*file),
        _ => None,
    };

    match file_name {
        Some(file) => format!("{COMMONS_PAGE_PREFIX}{file}"),
        None => trimmed.to_string(),
    }
}
