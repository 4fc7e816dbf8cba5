//! Content-type resolution from the package file extension

use std::path::Path;

/// Content type used when the extension is not in the table
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const CONTENT_TYPES: &[(&str, &str)] = &[
    ("apk", "application/vnd.android.package-archive"),
    ("aab", "application/vnd.android.package-archive"),
    ("msi", "application/x-msi"),
    ("plist", "application/xml"),
    ("aetx", "application/c-x509-ca-cert"),
    ("cer", "application/pkix-cert"),
    ("xap", "application/x-silverlight-app"),
    ("appx", "application/x-appx"),
    ("appxbundle", "application/x-appxbundle"),
    ("appxupload", "application/x-appxupload"),
    ("appxsym", "application/x-appxupload"),
    ("msix", "application/x-msix"),
    ("msixbundle", "application/x-msixbundle"),
    ("msixupload", "application/x-msixupload"),
    ("msixsym", "application/x-msixupload"),
];

/// Resolve the content type for an extension (without the leading dot).
///
/// Lookup is case-insensitive; unknown extensions map to [`DEFAULT_CONTENT_TYPE`].
pub fn resolve_content_type(extension: &str) -> &'static str {
    CONTENT_TYPES
        .iter()
        .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        .map(|(_, content_type)| *content_type)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

/// Resolve the content type for a file path from its extension
pub fn content_type_for_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .map(resolve_content_type)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}
