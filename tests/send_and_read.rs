//! End-to-end checks across composition, delivery and decoding, with an
//! in-memory transport standing in for the SMTP server.

use std::cell::RefCell;
use std::fs;

use ezmail::mail::decoders::decompose;
use ezmail::{EzSender, ImageOptions, SendConfig, SenderCredentials, ServerConfig};
use lettre::Transport;
use lettre::address::Envelope;

#[derive(Default)]
struct Outbox {
    messages: RefCell<Vec<Vec<u8>>>,
    reject: Vec<String>,
}

impl Transport for Outbox {
    type Ok = ();
    type Error = String;

    fn send_raw(&self, envelope: &Envelope, email: &[u8]) -> Result<(), String> {
        if envelope.to().iter().any(|a| self.reject.contains(&a.to_string())) {
            return Err("550 rejected".to_string());
        }
        self.messages.borrow_mut().push(email.to_vec());
        Ok(())
    }
}

fn sender() -> EzSender {
    let config = SendConfig::new(
        ServerConfig::new("smtp.example.com", 465),
        SenderCredentials::new("me@example.com", "secret"),
    )
    .unwrap();
    EzSender::new(config)
}

#[test]
fn sent_message_decomposes_back() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.pdf");
    let logo = dir.path().join("logo.png");
    fs::write(&report, b"%PDF-1.4 fake").unwrap();
    fs::write(&logo, b"\x89PNG fake").unwrap();

    let mut ez = sender();
    ez.set_subject("Monthly report");
    ez.add_text("<h1>Hello!</h1>\n<p>The report is attached.</p>");
    ez.add_image(
        &logo,
        ImageOptions {
            width: Some("120px".into()),
            ..Default::default()
        },
    )
    .unwrap();
    ez.add_attachment(&report).unwrap();

    let outbox = Outbox::default();
    let result = ez.send_with(&outbox, "you@example.com");
    assert_eq!(result.sent, vec!["you@example.com".to_string()]);

    let raw = outbox.messages.borrow()[0].clone();
    let mail = decompose(&raw).unwrap();

    assert_eq!(mail.subject, "Monthly report");
    assert_eq!(mail.sender, "me@example.com");
    assert_eq!(mail.body, "Hello! The report is attached.");

    let names: Vec<&str> = mail.attachments.iter().map(|a| a.filename.as_str()).collect();
    assert_eq!(names, vec!["logo.png", "report.pdf"]);
    assert_eq!(mail.attachments[1].content_type, "application/pdf");
    assert_eq!(mail.attachments[1].data, b"%PDF-1.4 fake".to_vec());
}

#[test]
fn buckets_cover_distinct_recipients() {
    let mut ez = sender();
    ez.add_text("<p>x</p>");
    let outbox = Outbox {
        reject: vec!["b@example.com".into()],
        ..Default::default()
    };

    let recipients = vec![
        "a@example.com",
        "b@example.com",
        "a@example.com",
        "c@example.com",
        "broken",
    ];
    let result = ez.send_with(&outbox, recipients);

    assert_eq!(result.sent.len() + result.failed.len(), 4);
    assert!(result.sent.iter().all(|r| !result.failed.contains_key(r)));
    assert_eq!(outbox.messages.borrow().len(), 2);
}

#[test]
fn empty_body_sends_placeholder_plain_text() {
    let mut ez = sender();
    ez.add_text("<p></p>");
    let outbox = Outbox::default();
    ez.send_with(&outbox, "you@example.com");

    let mail = decompose(&outbox.messages.borrow()[0]).unwrap();
    assert_eq!(mail.body, "Content not available.");
}
