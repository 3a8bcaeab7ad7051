use lettre::Message;
use lettre::message::header::{ContentDisposition, ContentId, ContentType};
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compose::body::{file_name, html_to_plain};
use crate::domain::email::InlineImage;
use crate::domain::text::decode_utf8_ignoring;
use crate::error::{EzmailError, Result};

/// Parts shared by every recipient of one batch.
#[derive(Debug, Clone, Copy)]
pub struct MessageParts<'a> {
    pub from: &'a str,
    pub subject: Option<&'a str>,
    pub html: &'a str,
    pub inline_images: &'a [InlineImage],
    pub attachments: &'a [PathBuf],
}

/// Builds the complete `multipart/mixed` message for one recipient.
///
/// Layout: `alternative(plain, html)`, then inline images, then attachments.
/// Attachments are read from disk on every call; files removed since they were
/// added are left out.
pub fn build_message(parts: &MessageParts<'_>, to: &str) -> Result<Message> {
    let from: Mailbox = parts
        .from
        .parse()
        .map_err(|e| EzmailError::InvalidInput(format!("invalid sender '{}': {e}", parts.from)))?;
    let to_mailbox: Mailbox = to
        .parse()
        .map_err(|e| EzmailError::InvalidInput(format!("invalid recipient '{to}': {e}")))?;

    // plain first: clients render the last alternative they understand
    let alternative = MultiPart::alternative()
        .singlepart(SinglePart::plain(html_to_plain(parts.html)))
        .singlepart(SinglePart::html(parts.html.to_string()));
    let mut mixed = MultiPart::mixed().multipart(alternative);

    for img in parts.inline_images {
        mixed = mixed.singlepart(inline_part(img)?);
    }

    for path in parts.attachments {
        if let Some(part) = attachment_part(path)? {
            mixed = mixed.singlepart(part);
        }
    }

    Message::builder()
        .from(from)
        .to(to_mailbox)
        .subject(parts.subject.unwrap_or(""))
        .multipart(mixed)
        .map_err(|e| EzmailError::InvalidInput(format!("failed to build email: {e}")))
}

fn inline_part(img: &InlineImage) -> Result<SinglePart> {
    let content_type = parse_content_type(&format!("image/{}", img.mime_subtype))?;
    Ok(SinglePart::builder()
        .header(content_type)
        .header(ContentDisposition::inline_with_name(&img.filename))
        .header(ContentId::from(format!("<{}>", img.cid)))
        .body(img.bytes.clone()))
}

fn attachment_part(path: &Path) -> Result<Option<SinglePart>> {
    if !path.is_file() {
        debug!("attachment {} no longer exists, leaving it out", path.display());
        return Ok(None);
    }

    let data = fs::read(path)?;
    let name = file_name(path);
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    let part = match mime.type_().as_str() {
        "text" => {
            let content_type = parse_content_type(&format!("{}; charset=utf-8", mime.essence_str()))?;
            Attachment::new(name).body(decode_utf8_ignoring(&data), content_type)
        }
        // image, audio and everything else travel as binary under their guessed type
        _ => Attachment::new(name).body(data, parse_content_type(mime.essence_str())?),
    };
    Ok(Some(part))
}

fn parse_content_type(s: &str) -> Result<ContentType> {
    ContentType::parse(s).map_err(|e| EzmailError::InvalidInput(format!("bad content type {s}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatted(msg: &Message) -> String {
        String::from_utf8(msg.formatted()).unwrap()
    }

    fn parts<'a>(html: &'a str, images: &'a [InlineImage], attachments: &'a [PathBuf]) -> MessageParts<'a> {
        MessageParts {
            from: "me@example.com",
            subject: Some("Welcome!"),
            html,
            inline_images: images,
            attachments,
        }
    }

    #[test]
    fn headers_and_alternative_order() {
        let msg = build_message(&parts("<p>Hello</p>", &[], &[]), "you@example.com").unwrap();
        let raw = formatted(&msg);

        assert!(raw.contains("From: me@example.com"));
        assert!(raw.contains("To: you@example.com"));
        assert!(raw.contains("Subject: Welcome!"));
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("multipart/alternative"));

        let plain = raw.find("text/plain").unwrap();
        let html = raw.find("text/html").unwrap();
        assert!(plain < html);
        assert!(raw.contains("<p>Hello</p>"));
    }

    #[test]
    fn missing_subject_is_empty() {
        let mut p = parts("x", &[], &[]);
        p.subject = None;
        let raw = formatted(&build_message(&p, "you@example.com").unwrap());
        assert!(raw.contains("Subject:"));
        assert!(!raw.contains("Subject: Welcome!"));
    }

    #[test]
    fn inline_images_carry_content_id() {
        let images = vec![InlineImage {
            cid: "logo_cid".into(),
            mime_subtype: "png".into(),
            bytes: vec![1, 2, 3],
            filename: "logo.png".into(),
        }];
        let raw = formatted(&build_message(&parts("x", &images, &[]), "you@example.com").unwrap());
        assert!(raw.contains("Content-ID: <logo_cid>"));
        assert!(raw.contains("image/png"));
        assert!(raw.contains("inline; filename=\"logo.png\""));
    }

    #[test]
    fn attachments_typed_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("report.pdf");
        let blob = dir.path().join("data.unknownext");
        fs::write(&pdf, b"%PDF-1.4").unwrap();
        fs::write(&blob, b"\x00\x01").unwrap();

        let attachments = vec![pdf, blob];
        let raw = formatted(&build_message(&parts("x", &[], &attachments), "you@example.com").unwrap());
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("attachment; filename=\"report.pdf\""));
        assert!(raw.contains("application/octet-stream"));
        assert!(raw.contains("attachment; filename=\"data.unknownext\""));
    }

    #[test]
    fn deleted_attachment_is_left_out() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.pdf");
        let gone = dir.path().join("gone.pdf");
        fs::write(&kept, b"%PDF").unwrap();
        fs::write(&gone, b"%PDF").unwrap();
        fs::remove_file(&gone).unwrap();

        let attachments = vec![kept, gone];
        let raw = formatted(&build_message(&parts("x", &[], &attachments), "you@example.com").unwrap());
        assert!(raw.contains("kept.pdf"));
        assert!(!raw.contains("gone.pdf"));
    }

    #[test]
    fn invalid_recipient_is_an_error() {
        assert!(matches!(
            build_message(&parts("x", &[], &[]), "not an address"),
            Err(EzmailError::InvalidInput(_))
        ));
    }
}
