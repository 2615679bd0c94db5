//! Graph URL construction.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::types::GraphConfig;

/// Everything except RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Drive-relative item path: `folder/file_name`, or just the file name.
///
/// Backslashes become `/` and surrounding slashes are dropped.
pub fn item_path(folder: &str, file_name: &str) -> String {
    let folder = folder.replace('\\', "/");
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        file_name.to_string()
    } else {
        format!("{folder}/{file_name}")
    }
}

/// `createUploadSession` URL for `item_path`.
///
/// Uses the configured site and drive when both are set, otherwise the
/// tenant's default site drive.
pub fn create_session_url(config: &GraphConfig, item_path: &str) -> String {
    let encoded = encode_path(item_path);
    match (&config.site_id, &config.drive_id) {
        (Some(site), Some(drive)) => format!(
            "{}/sites/{}/drives/{}/root:/{encoded}:/createUploadSession",
            config.base_url,
            utf8_percent_encode(site, PATH_SEGMENT),
            utf8_percent_encode(drive, PATH_SEGMENT),
        ),
        _ => format!(
            "{}/sites/root/drive/root:/{encoded}:/createUploadSession",
            config.base_url
        ),
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_path_without_folder() {
        assert_eq!(item_path("", "a.zip"), "a.zip");
        assert_eq!(item_path("/", "a.zip"), "a.zip");
    }

    #[test]
    fn item_path_normalizes_backslashes() {
        assert_eq!(item_path("Docs\\Backups", "a.zip"), "Docs/Backups/a.zip");
        assert_eq!(item_path("/Docs/Backups/", "a.zip"), "Docs/Backups/a.zip");
    }

    #[test]
    fn targeted_site_and_drive() {
        let cfg = GraphConfig::new("contoso.sharepoint.com,abc,def", "b!xyz");
        let url = create_session_url(&cfg, "Docs/a.zip");
        assert_eq!(
            url,
            "https://graph.microsoft.com/v1.0/sites/contoso.sharepoint.com%2Cabc%2Cdef/drives/b%21xyz/root:/Docs/a.zip:/createUploadSession"
        );
    }

    #[test]
    fn fallback_default_drive() {
        let cfg = GraphConfig::new("site", "");
        let url = create_session_url(&cfg, "a.zip");
        assert_eq!(
            url,
            "https://graph.microsoft.com/v1.0/sites/root/drive/root:/a.zip:/createUploadSession"
        );
    }

    #[test]
    fn segments_are_percent_encoded() {
        let cfg = GraphConfig::default();
        let url = create_session_url(&cfg, "My Docs/report #1:final.zip");
        assert!(url.contains("/root:/My%20Docs/report%20%231%3Afinal.zip:/"));
    }
}
