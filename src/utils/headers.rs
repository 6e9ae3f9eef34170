//! Parsing of the two response headers the fetcher cares about

/// Parsed `Content-Disposition` header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDisposition {
    /// `inline`, `attachment`, ...
    pub disposition: String,
    pub filename: Option<String>,
}

impl ContentDisposition {
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition.eq_ignore_ascii_case("attachment")
    }
}

/// Parsed `Content-Type` header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentType {
    /// Lowercased essence, e.g. `text/css`
    pub mime: String,
    pub charset: Option<String>,
}

/// Split a header value into `;`-separated parameters, honoring quotes.
fn split_params(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ';' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts.into_iter().map(|p| p.trim().to_string()).collect()
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

/// Decode an RFC 5987 extended value (`UTF-8''na%C3%AFve.txt`).
fn decode_ext_value(value: &str) -> Option<String> {
    let mut pieces = value.splitn(3, '\'');
    let charset = pieces.next()?;
    let _language = pieces.next()?;
    let encoded = pieces.next()?;
    if charset.eq_ignore_ascii_case("utf-8") {
        urlencoding::decode(encoded).ok().map(|s| s.into_owned())
    } else {
        let bytes = urlencoding::decode_binary(encoded.as_bytes());
        Some(bytes.iter().map(|&b| b as char).collect())
    }
}

/// Parse a `Content-Disposition` header value.
///
/// `filename*` takes precedence over `filename` when both are present.
#[must_use]
pub fn parse_content_disposition(value: &str) -> ContentDisposition {
    let mut params = split_params(value).into_iter();
    let disposition = params.next().unwrap_or_default().to_ascii_lowercase();
    let mut filename = None;
    let mut filename_ext = None;
    for param in params {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename" => filename = Some(unquote(raw)),
            "filename*" => filename_ext = decode_ext_value(&unquote(raw)),
            _ => {}
        }
    }
    ContentDisposition {
        disposition,
        filename: filename_ext.or(filename).filter(|f| !f.is_empty()),
    }
}

/// Parse a `Content-Type` header value.
#[must_use]
pub fn parse_content_type(value: &str) -> ContentType {
    let mut params = split_params(value).into_iter();
    let mime = params.next().unwrap_or_default().to_ascii_lowercase();
    let charset = params.find_map(|param| {
        let (key, raw) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| unquote(raw))
            .filter(|c| !c.is_empty())
    });
    ContentType { mime, charset }
}
