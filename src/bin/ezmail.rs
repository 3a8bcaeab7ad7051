use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use ezmail::auth::secret_store;
use ezmail::config::load_config;
use ezmail::{EzMail, EzReader, EzSender, ImageOptions, SearchQuery};

#[derive(Parser)]
#[command(name = "ezmail")]
#[command(about = "Send and read email over SMTP/IMAP", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.config/ezmail/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one message to each recipient
    Send {
        #[arg(long, required = true)]
        to: Vec<String>,

        #[arg(long)]
        subject: Option<String>,

        /// HTML or text fragment, may be repeated
        #[arg(long)]
        html: Vec<String>,

        /// .html template rendered with --var values
        #[arg(long)]
        template: Option<PathBuf>,

        /// Template variable as key=value
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Inline image appended after the text
        #[arg(long)]
        image: Vec<PathBuf>,

        #[arg(long)]
        attachment: Vec<PathBuf>,
    },

    /// Search a mailbox and print matching messages as JSON
    Fetch {
        #[arg(long, default_value = "INBOX")]
        mailbox: String,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, default_value = "ALL")]
        status: String,

        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        subject: Option<String>,

        #[arg(long)]
        text: Option<String>,

        #[arg(long)]
        body: Option<String>,

        /// DD-Mon-YYYY
        #[arg(long)]
        on: Option<String>,

        #[arg(long)]
        since: Option<String>,

        #[arg(long)]
        before: Option<String>,
    },

    /// List mailboxes of the configured account
    Mailboxes,

    /// Store a password or OAuth2 token in the OS keyring
    SetSecret {
        #[arg(long)]
        email: String,
    },
}

fn parse_var(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {s}"))
}

#[derive(Serialize)]
struct AttachmentView<'a> {
    filename: &'a str,
    content_type: &'a str,
    size: usize,
}

#[derive(Serialize)]
struct MailView<'a> {
    sender: &'a str,
    subject: &'a str,
    date: Option<String>,
    body: &'a str,
    attachments: Vec<AttachmentView<'a>>,
}

impl<'a> From<&'a EzMail> for MailView<'a> {
    fn from(m: &'a EzMail) -> Self {
        MailView {
            sender: &m.sender,
            subject: &m.subject,
            date: m.date.map(|d| d.to_rfc3339()),
            body: &m.body,
            attachments: m
                .attachments
                .iter()
                .map(|a| AttachmentView {
                    filename: &a.filename,
                    content_type: &a.content_type,
                    size: a.data.len(),
                })
                .collect(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetSecret { email } => {
            eprintln!("Paste password or token (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            let secret = secret.trim();
            if secret.is_empty() {
                return Err(anyhow!("empty secret, nothing saved"));
            }
            secret_store::save_secret(&email, secret)?;
            println!("Saved secret for {}", email);
            Ok(())
        }

        Command::Send {
            to,
            subject,
            html,
            template,
            vars,
            image,
            attachment,
        } => {
            let cfg = load_config(cli.config.as_deref()).map_err(|e| anyhow!("Configuration error: {e}"))?;
            let mut sender = EzSender::new(cfg.send_config()?);

            if let Some(subject) = subject {
                sender.set_subject(subject);
            }
            for fragment in html {
                sender.add_text(fragment);
            }
            if let Some(template) = template {
                let mut ctx = tera::Context::new();
                for (k, v) in &vars {
                    ctx.insert(k, v);
                }
                sender
                    .use_template(&template, &ctx)
                    .with_context(|| format!("rendering {}", template.display()))?;
            }
            for path in image {
                sender.add_image(&path, ImageOptions::default())?;
            }
            for path in attachment {
                sender.add_attachment(&path)?;
            }

            let token = sender.cancel_token();
            ctrlc::set_handler(move || token.cancel())?;

            let result = sender.send(to)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }

        Command::Fetch {
            mailbox,
            limit,
            status,
            from,
            subject,
            text,
            body,
            on,
            since,
            before,
        } => {
            let cfg = load_config(cli.config.as_deref()).map_err(|e| anyhow!("Configuration error: {e}"))?;
            let query = SearchQuery {
                status,
                sender: from,
                subject,
                text,
                body,
                on,
                since,
                before,
            };

            let mut reader = EzReader::new(cfg.read_config()?);
            reader.connect()?;
            let fetched = reader.fetch_messages(&mailbox, limit, &query);
            reader.disconnect();

            let mails = fetched?;
            let views: Vec<MailView> = mails.iter().map(MailView::from).collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
            Ok(())
        }

        Command::Mailboxes => {
            let cfg = load_config(cli.config.as_deref()).map_err(|e| anyhow!("Configuration error: {e}"))?;
            let mut reader = EzReader::new(cfg.read_config()?);
            reader.connect()?;
            for name in reader.list_mailboxes()? {
                println!("{name}");
            }
            reader.disconnect();
            Ok(())
        }
    }
}
