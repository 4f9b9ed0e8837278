//! Validation of untrusted names before they touch the filesystem

const MAX_NAME_LEN: usize = 64;
const MAX_EXTENSION_LEN: usize = 8;

/// `true` for 1-64 ASCII letters, digits, `-` or `_`.
///
/// Anything that could change directory (`/`, `\`, `..`) fails this check.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Lowercased extension of a client-supplied file name, if it is short and
/// alphanumeric.
pub fn safe_extension(file_name: &str) -> Option<String> {
    let base = file_name.rsplit(|c| c == '/' || c == '\\').next()?;
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    if !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
