//! Body assembly: turns the ordered content blocks into one HTML document plus
//! the inline images it references, and derives the plain-text alternative.

use log::{debug, warn};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::domain::email::{ContentBlock, ImageBlock, InlineImage, SkipReason};

/// Used when stripping the markup leaves nothing behind.
pub const PLAIN_TEXT_PLACEHOLDER: &str = "Content not available.";

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));

/// Result of one assembly pass.
#[derive(Debug, Default)]
pub struct AssembledBody {
    pub html: String,
    pub inline_images: Vec<InlineImage>,
    pub skipped: Vec<SkipReason>,
}

/// Walks the blocks once. Image files are read here; anything that cannot be
/// turned into an inline image is reported in `skipped` instead of failing.
pub fn assemble(blocks: &[ContentBlock]) -> AssembledBody {
    let mut out = AssembledBody::default();

    for block in blocks {
        match block {
            ContentBlock::Text(html) => out.html.push_str(html),
            ContentBlock::Image(image) => {
                if !image.path.is_file() {
                    let reason = SkipReason::Missing(image.path.clone());
                    warn!("skipping inline image: {reason}");
                    out.skipped.push(reason);
                    continue;
                }

                let explicit = image.cid.as_deref().filter(|c| !c.is_empty());
                let cid = explicit.map(str::to_string).unwrap_or_else(generate_cid);
                if explicit.is_none() {
                    out.html.push_str(&img_tag(&cid, image));
                }

                match load_inline_image(&image.path, cid) {
                    Ok(img) => {
                        debug!("inline image {} as cid {}", img.filename, img.cid);
                        out.inline_images.push(img);
                    }
                    Err(reason) => {
                        warn!("skipping inline image: {reason}");
                        out.skipped.push(reason);
                    }
                }
            }
        }
    }

    out
}

fn generate_cid() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("img{}", &hex[..8])
}

fn img_tag(cid: &str, image: &ImageBlock) -> String {
    let mut style = String::new();
    if image.width.is_some() || image.height.is_some() {
        style.push_str(" style=\"");
        if let Some(w) = &image.width {
            style.push_str(&format!("width:{w};"));
        }
        if let Some(h) = &image.height {
            style.push_str(&format!("height:{h};"));
        }
        style.push('"');
    }
    format!("<br><img src=\"cid:{cid}\"{style}><br>")
}

fn load_inline_image(path: &Path, cid: String) -> Result<InlineImage, SkipReason> {
    let bytes = fs::read(path).map_err(|e| SkipReason::Unreadable {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let mime = mime_guess::from_path(path).first();
    let subtype = match &mime {
        Some(m) if m.type_().as_str() == "image" => m.subtype().as_str().to_string(),
        other => {
            return Err(SkipReason::NotAnImage {
                path: path.to_path_buf(),
                mime: other
                    .as_ref()
                    .map(|m| m.essence_str().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            });
        }
    };

    Ok(InlineImage {
        cid,
        mime_subtype: subtype,
        bytes,
        filename: file_name(path),
    })
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Strips tags, collapses whitespace and falls back to the placeholder.
pub fn html_to_plain(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, "");
    let text = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        PLAIN_TEXT_PLACEHOLDER.to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn image_file(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let p = dir.path().join(name);
        fs::write(&p, b"\x89PNG fake").unwrap();
        p
    }

    fn image(path: PathBuf) -> ImageBlock {
        ImageBlock {
            path,
            ..Default::default()
        }
    }

    #[test]
    fn text_blocks_are_concatenated_verbatim() {
        let body = assemble(&[
            ContentBlock::Text("<p>a</p>".into()),
            ContentBlock::Text("<p>b</p>".into()),
        ]);
        assert_eq!(body.html, "<p>a</p><p>b</p>");
        assert!(body.inline_images.is_empty());
    }

    #[test]
    fn image_without_cid_gets_tag_with_width() {
        let dir = tempfile::tempdir().unwrap();
        let mut block = image(image_file(&dir, "logo.png"));
        block.width = Some("200px".into());

        let body = assemble(&[ContentBlock::Image(block)]);
        assert_eq!(body.inline_images.len(), 1);
        let img = &body.inline_images[0];
        assert!(img.cid.starts_with("img"));
        assert_eq!(img.cid.len(), 11);
        assert_eq!(img.mime_subtype, "png");
        assert_eq!(img.filename, "logo.png");
        assert_eq!(
            body.html,
            format!("<br><img src=\"cid:{}\" style=\"width:200px;\"><br>", img.cid)
        );
    }

    #[test]
    fn width_and_height_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let mut block = image(image_file(&dir, "logo.jpg"));
        block.width = Some("50%".into());
        block.height = Some("10em".into());

        let body = assemble(&[ContentBlock::Image(block)]);
        assert!(body.html.contains("style=\"width:50%;height:10em;\""));
        assert_eq!(body.inline_images[0].mime_subtype, "jpeg");
    }

    #[test]
    fn explicit_cid_suppresses_tag() {
        let dir = tempfile::tempdir().unwrap();
        let mut block = image(image_file(&dir, "logo.png"));
        block.cid = Some("logo_cid".into());
        block.width = Some("200px".into());

        let body = assemble(&[
            ContentBlock::Text("<img src=\"cid:logo_cid\">".into()),
            ContentBlock::Image(block),
        ]);
        assert_eq!(body.html, "<img src=\"cid:logo_cid\">");
        assert_eq!(body.inline_images[0].cid, "logo_cid");
    }

    #[test]
    fn missing_image_is_skipped_without_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = image_file(&dir, "gone.png");
        fs::remove_file(&path).unwrap();

        let body = assemble(&[ContentBlock::Image(image(path.clone()))]);
        assert_eq!(body.html, "");
        assert!(body.inline_images.is_empty());
        assert_eq!(body.skipped, vec![SkipReason::Missing(path)]);
    }

    #[test]
    fn non_image_mime_keeps_tag_but_drops_part() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "hello").unwrap();

        let body = assemble(&[ContentBlock::Image(image(path.clone()))]);
        assert!(body.html.contains("<img src=\"cid:img"));
        assert!(body.inline_images.is_empty());
        assert_eq!(
            body.skipped,
            vec![SkipReason::NotAnImage {
                path,
                mime: "text/plain".into()
            }]
        );
    }

    #[test]
    fn generated_cids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = image(image_file(&dir, "a.png"));
        let b = image(image_file(&dir, "b.gif"));
        let body = assemble(&[ContentBlock::Image(a), ContentBlock::Image(b)]);
        assert_eq!(body.inline_images.len(), 2);
        assert_ne!(body.inline_images[0].cid, body.inline_images[1].cid);
    }

    #[test]
    fn plain_text_strips_markup_and_whitespace() {
        assert_eq!(
            html_to_plain("<h1>Hello!</h1>\n  <p>Welcome   to our\tplatform.</p>"),
            "Hello! Welcome to our platform."
        );
    }

    #[test]
    fn plain_text_without_markup_is_trimmed_original() {
        assert_eq!(html_to_plain("  just text  "), "just text");
    }

    #[test]
    fn markup_only_yields_placeholder() {
        assert_eq!(html_to_plain("<p></p>"), PLAIN_TEXT_PLACEHOLDER);
        assert_eq!(html_to_plain(""), PLAIN_TEXT_PLACEHOLDER);
    }
}
