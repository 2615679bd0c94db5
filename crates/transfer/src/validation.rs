use crate::TransferError;

/// Characters that are not allowed in local file names on common filesystems.
const RESERVED_CHARS: [char; 7] = ['|', '<', '>', ':', '*', '?', '"'];

/// Replaces characters that are invalid in local file names with `_`.
///
/// Only the reserved set is touched; everything else, including
/// non-ASCII text, passes through.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Checks that a remote directory entry name is a single path component.
///
/// Rejects:
/// - Empty names
/// - `.` and `..`
/// - Names containing `/` or NUL
///
/// `\` is an ordinary character in SFTP names and is accepted.
pub fn validate_entry_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }
    if name == "." || name == ".." {
        return Err(TransferError::InvalidName(format!(
            "relative component not allowed: {name}"
        )));
    }
    if name.contains(['/', '\0']) {
        return Err(TransferError::InvalidName(format!(
            "path separator not allowed: {name}"
        )));
    }
    Ok(())
}
