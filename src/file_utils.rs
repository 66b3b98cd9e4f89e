use std::io::Read;
use std::path::Path;

use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpRequest, HttpResponse, ResponseError};

/// Number of leading bytes inspected when sniffing a file's content type.
pub const SNIFF_LEN: usize = 512;

const TEXT_PLAIN_UTF_8: &str = "text/plain; charset=utf-8";

/// Create `dir` and any missing parents. Does nothing if `dir` already exists.
pub fn create_dir_if_not_exist<P: AsRef<Path>>(dir: P) -> std::io::Result<()> {
    let dir = dir.as_ref();
    if dir.exists() {
        return Ok(());
    }

    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o777);
    }
    builder.create(dir)
}

/// Send the file at `path_name` and ask the browser to save it as `display_name`.
///
/// A missing file yields a 404 whose body is the underlying I/O error text.
/// Range and conditional requests are handled by [`NamedFile`].
pub fn download_static_file<P: AsRef<Path>>(
    req: &HttpRequest,
    path_name: P,
    display_name: &str,
) -> HttpResponse {
    let path_name = path_name.as_ref();
    if let Err(e) = std::fs::metadata(path_name) {
        if e.kind() == std::io::ErrorKind::NotFound {
            return HttpResponse::NotFound()
                .content_type(mime::TEXT_PLAIN_UTF_8)
                .body(e.to_string());
        }
    }

    match NamedFile::open(path_name) {
        Ok(file) => file
            .set_content_disposition(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(display_name.to_string())],
            })
            .into_response(req),
        Err(e) => {
            log::warn!("Failed to open {:?} for download: {}", path_name, e);
            e.error_response()
        }
    }
}

/// Read up to [`SNIFF_LEN`] leading bytes of the file at `path`.
pub fn read_file_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file_head = [0u8; SNIFF_LEN];
    let mut file = std::fs::File::open(path)?;
    let mut n = 0;
    while n < SNIFF_LEN {
        match file.read(&mut file_head[n..])? {
            0 => break,
            read => n += read,
        }
    }
    Ok(file_head[..n].to_vec())
}

/// Signatures that mark a head as HTML once leading whitespace is skipped.
/// Letters match case-insensitively and a space or `>` must follow.
const HTML_SIGNATURES: [&[u8]; 17] = [
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

const TEXT_HTML_UTF_8: &str = "text/html; charset=utf-8";
const TEXT_XML_UTF_8: &str = "text/xml; charset=utf-8";

/// Infer a MIME type from leading bytes using the WHATWG sniffing order:
/// markup and byte order marks, then magic numbers, then a plain text check.
pub fn detect_content_type(head: &[u8]) -> String {
    let head = &head[..head.len().min(SNIFF_LEN)];

    if let Some(text_type) = sniff_markup_or_bom(head) {
        return text_type.to_string();
    }
    if let Some(kind) = infer::get(head).filter(|k| k.matcher_type() != infer::MatcherType::Text) {
        return kind.mime_type().to_string();
    }
    if head.iter().any(|&b| is_binary_byte(b)) {
        mime::APPLICATION_OCTET_STREAM.to_string()
    } else {
        TEXT_PLAIN_UTF_8.to_string()
    }
}

fn sniff_markup_or_bom(head: &[u8]) -> Option<&'static str> {
    let trimmed = match head.iter().position(|&b| !is_whitespace_byte(b)) {
        Some(start) => &head[start..],
        None => &[][..],
    };

    if HTML_SIGNATURES.iter().any(|sig| matches_html_signature(trimmed, sig)) {
        return Some(TEXT_HTML_UTF_8);
    }
    if trimmed.starts_with(b"<?xml") {
        return Some(TEXT_XML_UTF_8);
    }
    if head.starts_with(b"\xFE\xFF") {
        return Some("text/plain; charset=utf-16be");
    }
    if head.starts_with(b"\xFF\xFE") {
        return Some("text/plain; charset=utf-16le");
    }
    if head.starts_with(b"\xEF\xBB\xBF") {
        return Some(TEXT_PLAIN_UTF_8);
    }
    None
}

fn matches_html_signature(data: &[u8], sig: &[u8]) -> bool {
    if data.len() <= sig.len() || !data[..sig.len()].eq_ignore_ascii_case(sig) {
        return false;
    }
    matches!(data[sig.len()], b' ' | b'>')
}

fn is_whitespace_byte(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

/// Case-insensitive exact match of `file_type` against `allowed`.
pub fn is_file_type_allowed<S: AsRef<str>>(allowed: &[S], file_type: &str) -> bool {
    allowed.iter().any(|t| t.as_ref().eq_ignore_ascii_case(file_type))
}

/// The final path component of a client supplied file name.
pub fn base_file_name(filename: &str) -> &str {
    filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename)
}

/// Everything from the last `.` of `filename`, dot included, or `""` when there is none.
pub fn extract_extension(filename: &str) -> &str {
    filename.rfind('.').map(|i| &filename[i..]).unwrap_or("")
}
