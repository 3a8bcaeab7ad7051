//! Turns a raw RFC 822 message into an [`EzMail`].

use chrono::{DateTime, Utc};
use log::debug;
use mailparse::{DispositionType, MailHeaderMap, ParsedContentDisposition, ParsedMail};

use crate::domain::email::{EzMail, MailAttachment};
use crate::domain::text::decode_utf8_ignoring;
use crate::error::{EzmailError, Result};

/// Decodes RFC 2047 encoded words in a raw header value.
///
/// A value `mailparse` cannot read as a header is taken as UTF-8 with the
/// undecodable bytes dropped.
pub fn decode_header_words(raw: &[u8]) -> String {
    let line = [b"X-Ezmail: ".as_slice(), raw, b"\r\n"].concat();
    mailparse::parse_header(&line)
        .map(|(header, _)| header.get_value())
        .unwrap_or_else(|_| decode_utf8_ignoring(raw))
}

/// Decomposes one fetched message.
///
/// Only a message that cannot be parsed at all is an error. A part whose
/// transfer encoding cannot be decoded is skipped and the rest is kept.
pub fn decompose(raw: &[u8]) -> Result<EzMail> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| EzmailError::Parse(e.to_string()))?;

    let subject = parsed
        .headers
        .get_first_header("Subject")
        .map(|h| decode_header_words(h.get_value_raw()))
        .unwrap_or_default();
    let sender = parsed
        .headers
        .get_first_header("From")
        .map(|h| String::from_utf8_lossy(h.get_value_raw()).trim().to_string())
        .unwrap_or_default();
    let date = parsed
        .headers
        .get_first_value("Date")
        .and_then(|d| mailparse::dateparse(&d).ok())
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));

    let mut leaves = Vec::new();
    collect_leaves(&parsed, &mut leaves);

    let mut body: Option<String> = None;
    let mut attachments = Vec::new();

    for (idx, part) in leaves.into_iter().enumerate() {
        let mimetype = part.ctype.mimetype.to_ascii_lowercase();
        let disposition = part.get_content_disposition();

        if body.is_none()
            && mimetype == "text/plain"
            && disposition.disposition != DispositionType::Attachment
        {
            match text_body(part) {
                Ok(text) => body = Some(text),
                Err(e) => debug!("part {idx}: cannot decode text body: {e}"),
            }
        }

        if let Some(filename) = part_filename(part, &disposition) {
            match part.get_body_raw() {
                Ok(data) => attachments.push(MailAttachment {
                    filename,
                    content_type: mimetype,
                    data,
                }),
                Err(e) => debug!("part {idx}: cannot decode attachment {filename}: {e}"),
            }
        }
    }

    Ok(EzMail {
        sender,
        subject,
        body: body.unwrap_or_default().trim().to_string(),
        attachments,
        date,
    })
}

/// UTF-8 and ASCII bodies keep only their valid bytes; other charsets go
/// through `mailparse`.
fn text_body(part: &ParsedMail<'_>) -> std::result::Result<String, mailparse::MailParseError> {
    match part.ctype.charset.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" | "us-ascii" | "ascii" => Ok(decode_utf8_ignoring(&part.get_body_raw()?)),
        _ => part.get_body(),
    }
}

/// Leaf parts in document order; multipart containers only contribute children.
fn collect_leaves<'a, 'b>(part: &'b ParsedMail<'a>, out: &mut Vec<&'b ParsedMail<'a>>) {
    if part.subparts.is_empty() {
        if !part.ctype.mimetype.to_ascii_lowercase().starts_with("multipart/") {
            out.push(part);
        }
        return;
    }
    for sub in &part.subparts {
        collect_leaves(sub, out);
    }
}

fn part_filename(part: &ParsedMail<'_>, disposition: &ParsedContentDisposition) -> Option<String> {
    disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .map(|name| decode_header_words(name.as_bytes()))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}
