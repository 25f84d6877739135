//! Blocking IMAP4rev1 client implementing [`MailSession`].
//!
//! Speaks the minimal command subset the trainer and router need (SELECT,
//! SEARCH, FETCH, COPY, STORE, LIST) against an already-reachable server
//! such as a localhost bridge. Commands are issued strictly one at a time;
//! responses are read to the tagged completion before the next command.

use crate::session::{MailSession, MessageId, Projection, SearchCriteria, SessionError};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;

pub struct ImapClient {
    reader: BufReader<TcpStream>,
    tag_seq: u32,
}

/// One untagged response line together with any literal payloads that were
/// embedded in it.
#[derive(Debug, Default, PartialEq)]
struct Untagged {
    line: String,
    literals: Vec<Vec<u8>>,
}

impl ImapClient {
    /// Connect and consume the server greeting.
    pub fn connect(host: &str, port: u16) -> Result<Self, SessionError> {
        let stream = TcpStream::connect((host, port))?;
        let mut client = Self {
            reader: BufReader::new(stream),
            tag_seq: 0,
        };
        let greeting = client.read_logical_line()?;
        if !greeting.line.starts_with("* OK") {
            return Err(SessionError::Protocol(format!(
                "unexpected greeting: {}",
                greeting.line
            )));
        }
        log::debug!("Connected to {host}:{port}");
        Ok(client)
    }

    pub fn login(&mut self, user: &str, password: &str) -> Result<(), SessionError> {
        self.run(&format!("LOGIN {} {}", quote(user), quote(password)))?;
        log::info!("Logged in as {user}");
        Ok(())
    }

    pub fn logout(&mut self) -> Result<(), SessionError> {
        self.run("LOGOUT")?;
        Ok(())
    }

    fn next_tag(&mut self) -> String {
        self.tag_seq += 1;
        format!("a{:04}", self.tag_seq)
    }

    /// Issue one command and collect untagged responses up to the tagged
    /// completion.
    fn run(&mut self, command: &str) -> Result<Vec<Untagged>, SessionError> {
        let tag = self.next_tag();
        let stream = self.reader.get_mut();
        write!(stream, "{tag} {command}\r\n")?;
        stream.flush()?;

        let mut untagged = Vec::new();
        loop {
            let item = self.read_logical_line()?;
            if let Some(completion) = item.line.strip_prefix(&format!("{tag} ")) {
                let (status, text) = completion.split_once(' ').unwrap_or((completion, ""));
                return match status {
                    "OK" => Ok(untagged),
                    "NO" => Err(SessionError::No(text.to_string())),
                    "BAD" => Err(SessionError::Bad(text.to_string())),
                    _ => Err(SessionError::Protocol(format!(
                        "unexpected completion: {}",
                        item.line
                    ))),
                };
            }
            untagged.push(item);
        }
    }

    /// Read one response line, following `{N}` literal continuations until
    /// the line actually ends.
    fn read_logical_line(&mut self) -> Result<Untagged, SessionError> {
        let mut item = Untagged::default();
        loop {
            let mut chunk = String::new();
            let n = self.reader.read_line(&mut chunk)?;
            if n == 0 {
                return Err(SessionError::Protocol("connection closed".to_string()));
            }
            let trimmed = chunk.trim_end_matches(['\r', '\n']);
            item.line.push_str(trimmed);
            match literal_size(trimmed) {
                Some(size) => {
                    let mut buf = vec![0u8; size];
                    self.reader.read_exact(&mut buf)?;
                    item.literals.push(buf);
                }
                None => break,
            }
        }
        Ok(item)
    }
}

impl MailSession for ImapClient {
    fn select(&mut self, folder: &str) -> Result<u32, SessionError> {
        let untagged = self.run(&format!("SELECT {}", quote(folder)))?;
        parse_exists(&untagged)
            .ok_or_else(|| SessionError::Protocol("SELECT reply missing EXISTS".to_string()))
    }

    fn search(&mut self, criteria: SearchCriteria) -> Result<Vec<MessageId>, SessionError> {
        let command = match criteria {
            SearchCriteria::All => "SEARCH ALL",
            SearchCriteria::Unseen => "SEARCH UNSEEN",
        };
        let untagged = self.run(command)?;
        Ok(parse_search_ids(&untagged))
    }

    fn fetch(&mut self, id: MessageId, projection: Projection) -> Result<Vec<u8>, SessionError> {
        let items = match projection {
            Projection::SubjectAndText => "(BODY.PEEK[HEADER.FIELDS (SUBJECT)] BODY.PEEK[TEXT])",
            Projection::Full => "(BODY.PEEK[])",
        };
        let untagged = self.run(&format!("FETCH {id} {items}"))?;

        // The subject-header literal ends with a blank line, so concatenating
        // the literals of the FETCH reply yields a parseable message.
        let mut raw = Vec::new();
        for item in untagged.iter().filter(|u| u.line.contains("FETCH")) {
            for literal in &item.literals {
                raw.extend_from_slice(literal);
            }
        }
        if raw.is_empty() {
            return Err(SessionError::Protocol(format!(
                "FETCH {id} returned no data"
            )));
        }
        Ok(raw)
    }

    fn copy(&mut self, id: MessageId, dest_folder: &str) -> Result<(), SessionError> {
        self.run(&format!("COPY {id} {}", quote(dest_folder)))?;
        Ok(())
    }

    fn mark_seen(&mut self, id: MessageId) -> Result<(), SessionError> {
        self.run(&format!("STORE {id} +FLAGS (\\Seen)"))?;
        Ok(())
    }

    fn list_folders(&mut self) -> Result<Vec<String>, SessionError> {
        let untagged = self.run(r#"LIST "" "*""#)?;
        Ok(untagged.iter().filter_map(parse_list_name).collect())
    }
}

/// Quote a string per the IMAP grammar.
fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Size of a trailing `{N}` literal announcement, if the line carries one.
fn literal_size(line: &str) -> Option<usize> {
    let rest = line.strip_suffix('}')?;
    let open = rest.rfind('{')?;
    rest[open + 1..].parse().ok()
}

fn parse_exists(untagged: &[Untagged]) -> Option<u32> {
    untagged.iter().find_map(|item| {
        let mut words = item.line.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("*"), Some(count), Some("EXISTS")) => count.parse().ok(),
            _ => None,
        }
    })
}

fn parse_search_ids(untagged: &[Untagged]) -> Vec<MessageId> {
    untagged
        .iter()
        .filter_map(|item| item.line.strip_prefix("* SEARCH"))
        .flat_map(|ids| ids.split_whitespace())
        .filter_map(|id| id.parse().ok())
        .map(MessageId)
        .collect()
}

/// Extract the folder name from a `* LIST (flags) delimiter name` reply.
/// The name may arrive as a quoted string, a bare atom, or a literal.
fn parse_list_name(item: &Untagged) -> Option<String> {
    if !item.line.starts_with("* LIST") {
        return None;
    }
    if let Some(literal) = item.literals.first() {
        return Some(String::from_utf8_lossy(literal).into_owned());
    }

    let rest = item.line.strip_prefix("* LIST ")?.trim_start();
    let rest = rest.strip_prefix('(')?;
    let close = rest.find(')')?;
    let rest = rest[close + 1..].trim_start();

    // Skip the hierarchy delimiter (quoted string or NIL).
    let rest = if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        quoted[end + 1..].trim_start()
    } else {
        rest.split_once(' ')?.1.trim_start()
    };

    if let Some(quoted) = rest.strip_prefix('"') {
        Some(quoted.strip_suffix('"').unwrap_or(quoted).to_string())
    } else if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}
