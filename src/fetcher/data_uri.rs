//! `data:` URL parsing and building

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// A decoded `data:` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub charset: Option<String>,
    /// `filename=` parameter, used by some producers to carry a name
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

impl DataUri {
    /// Parse `data:[<mediatype>][;base64],<data>`.
    #[must_use]
    pub fn parse(url: &str) -> Option<Self> {
        let rest = url.get(..5)?.eq_ignore_ascii_case("data:").then(|| &url[5..])?;
        let (meta, payload) = rest.split_once(',')?;

        let mut params = meta.split(';').map(str::trim);
        let mime = match params.next() {
            Some(m) if !m.is_empty() => m.to_ascii_lowercase(),
            _ => "text/plain".to_string(),
        };

        let mut charset = None;
        let mut filename = None;
        let mut is_base64 = false;
        for param in params {
            if param.eq_ignore_ascii_case("base64") {
                is_base64 = true;
            } else if let Some((key, value)) = param.split_once('=') {
                let value = urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string());
                match key.trim().to_ascii_lowercase().as_str() {
                    "charset" => charset = Some(value),
                    "filename" => filename = Some(value),
                    _ => {}
                }
            }
        }

        let bytes = if is_base64 {
            let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD.decode(compact).ok()?
        } else {
            urlencoding::decode_binary(payload.as_bytes()).into_owned()
        };

        Some(Self {
            mime,
            charset,
            filename,
            bytes,
        })
    }

    /// File extension for the MIME type, without the dot
    #[must_use]
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime)
    }
}

/// Base64 `data:` URL for `bytes`
#[must_use]
pub fn to_data_uri(bytes: &[u8], mime: &str) -> String {
    let capacity = base64::encoded_len(bytes.len(), true).unwrap_or(0) + mime.len() + 13;
    let mut encoded = String::with_capacity(capacity);
    encoded.push_str("data:");
    encoded.push_str(mime);
    encoded.push_str(";base64,");
    STANDARD.encode_string(bytes, &mut encoded);
    encoded
}

#[must_use]
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "text/html" => "html",
        "application/xhtml+xml" => "xhtml",
        "text/css" => "css",
        "text/javascript" | "application/javascript" | "application/x-javascript" => "js",
        "application/json" => "json",
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        "image/bmp" => "bmp",
        "font/woff" | "application/font-woff" => "woff",
        "font/woff2" => "woff2",
        "font/ttf" | "application/x-font-ttf" => "ttf",
        "font/otf" => "otf",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "text/vtt" => "vtt",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        _ => "dat",
    }
}

/// MIME type guessed from a file name's extension
#[must_use]
pub fn mime_for_filename(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "xhtml" => "application/xhtml+xml",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "vtt" => "text/vtt",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
