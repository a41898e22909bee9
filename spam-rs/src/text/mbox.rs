//! MBOX input for batch scoring
//!
//! Each message is split off the mbox stream and parsed into the fields the
//! batch report prints: envelope sender, date, recipients, subject, body,
//! Gmail category and direction.

use anyhow::Result;
use mail_parser::{Address, MessageParser};
use serde::Serialize;
use std::io::{BufRead, BufReader, Read, Split};
use std::iter::Peekable;

/// Gmail category derived from `X-Gmail-Labels`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    Spam,
    Promotions,
    Social,
    Updates,
    Inbox,
}

/// Whether the mailbox owner sent or received the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Sent,
    Received,
}

/// One parsed message of an mbox file
#[derive(Debug, Clone, Serialize)]
pub struct MboxMessage {
    /// Sender from the `From ` separator line
    pub from: String,
    /// `Date` header as RFC 3339, when present and parseable
    pub date: Option<String>,
    /// To and Cc addresses
    pub recipients: Vec<String>,
    pub subject: String,
    /// First text body; raw content when the message does not parse
    pub body: String,
    pub category: Category,
    pub direction: Direction,
}

impl MboxMessage {
    /// Parse one message from its raw bytes
    pub fn parse(from: String, raw: &[u8]) -> Self {
        let Some(parsed) = MessageParser::default().parse(raw) else {
            return Self {
                from,
                date: None,
                recipients: Vec::new(),
                subject: String::new(),
                body: String::from_utf8_lossy(raw).into_owned(),
                category: Category::Inbox,
                direction: Direction::Received,
            };
        };

        let labels = parsed
            .header_raw("X-Gmail-Labels")
            .map(|raw| raw.trim().to_string())
            .unwrap_or_default();

        let mut recipients = addresses(parsed.to());
        recipients.extend(addresses(parsed.cc()));

        Self {
            from,
            date: parsed.date().map(|d| d.to_rfc3339()),
            recipients,
            subject: parsed.subject().unwrap_or("").to_string(),
            body: parsed
                .body_text(0)
                .map(|b| b.to_string())
                .unwrap_or_default(),
            category: category(&labels),
            direction: direction(&labels),
        }
    }

    /// Text handed to the classifiers
    pub fn content(&self) -> String {
        format!("{}\n{}", self.subject, self.body)
    }
}

fn addresses(address: Option<&Address<'_>>) -> Vec<String> {
    match address {
        Some(Address::List(list)) => list
            .iter()
            .filter_map(|a| a.address())
            .map(str::to_string)
            .collect(),
        Some(Address::Group(groups)) => groups
            .iter()
            .flat_map(|g| g.addresses.iter())
            .filter_map(|a| a.address())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

fn category(labels: &str) -> Category {
    let labels = labels.to_lowercase().replace(' ', "_");
    if labels.contains("spam") {
        Category::Spam
    } else if labels.contains("category_promotions") {
        Category::Promotions
    } else if labels.contains("category_social") {
        Category::Social
    } else if labels.contains("category_updates") {
        Category::Updates
    } else {
        Category::Inbox
    }
}

fn direction(labels: &str) -> Direction {
    if labels.split(',').any(|label| label.trim() == "Sent") {
        Direction::Sent
    } else {
        Direction::Received
    }
}

fn is_separator(line: &[u8]) -> bool {
    line.starts_with(b"From ")
}

/// Undo mboxrd quoting: `>From ` and `>>From ` lose one `>`
fn unquote(line: &[u8]) -> &[u8] {
    let quotes = line.iter().take_while(|&&b| b == b'>').count();
    if quotes > 0 && line[quotes..].starts_with(b"From ") {
        &line[1..]
    } else {
        line
    }
}

/// Streaming mbox parser, yields one [`MboxMessage`] per separator line
pub struct MboxReader<R: Read> {
    lines: Peekable<Split<BufReader<R>>>,
}

impl<R: Read> MboxReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).split(b'\n').peekable(),
        }
    }

    /// Next message, `None` at end of input. Text before the first
    /// separator is ignored.
    pub fn read_message(&mut self) -> Result<Option<MboxMessage>> {
        let separator = loop {
            match self.lines.next() {
                None => return Ok(None),
                Some(line) => {
                    let line = line?;
                    if is_separator(&line) {
                        break line;
                    }
                }
            }
        };

        let sender = String::from_utf8_lossy(&separator)
            .split_whitespace()
            .nth(1)
            .unwrap_or("")
            .to_string();

        let mut raw = Vec::new();
        loop {
            match self.lines.peek() {
                None => break,
                Some(Ok(line)) if is_separator(line) => break,
                Some(_) => {}
            }
            if let Some(line) = self.lines.next() {
                raw.extend_from_slice(unquote(&line?));
                raw.push(b'\n');
            }
        }

        while raw.ends_with(b"\n\n") {
            raw.pop();
        }

        Ok(Some(MboxMessage::parse(sender, &raw)))
    }
}

impl<R: Read> Iterator for MboxReader<R> {
    type Item = Result<MboxMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_message().transpose()
    }
}
