//! Git commit object
//!
//! Commits record a tree snapshot, the commit they follow (none for the root
//! commit), authorship and a message.
//!
//! ## Format
//!
//! ```text
//! tree <tree-sha>
//! parent <parent-sha>          (omitted for the root commit)
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//!
//! <commit message>
//! ```

use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use std::io::BufRead;

/// Author or committer information
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    name: String,
    email: String,
    timestamp: DateTime<FixedOffset>,
}

impl Author {
    /// Create a new author stamped with the current local time
    pub fn new(name: String, email: String) -> Self {
        Self::new_with_timestamp(name, email, chrono::Local::now().fixed_offset())
    }

    pub fn new_with_timestamp(name: String, email: String, timestamp: DateTime<FixedOffset>) -> Self {
        Author {
            name,
            email,
            timestamp,
        }
    }

    /// Read GIT_AUTHOR_NAME, GIT_AUTHOR_EMAIL, and optionally GIT_AUTHOR_DATE.
    pub fn load_from_env() -> anyhow::Result<Self> {
        let name = std::env::var("GIT_AUTHOR_NAME").context("GIT_AUTHOR_NAME not set")?;
        let email = std::env::var("GIT_AUTHOR_EMAIL").context("GIT_AUTHOR_EMAIL not set")?;

        match std::env::var("GIT_AUTHOR_DATE") {
            Ok(date) => {
                let timestamp = DateTime::parse_from_rfc2822(&date)
                    .or_else(|_| DateTime::parse_from_str(&date, "%Y-%m-%d %H:%M:%S %z"))
                    .with_context(|| format!("Invalid GIT_AUTHOR_DATE: {date}"))?;

                Ok(Author::new_with_timestamp(name, email, timestamp))
            }
            Err(_) => Ok(Author::new(name, email)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// `Name <email> unix-seconds ±HHMM`
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }
}

impl TryFrom<&str> for Author {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // split from the right: the name may itself contain spaces
        let mut parts = value.rsplitn(3, ' ');
        let (Some(timezone), Some(timestamp), Some(identity)) =
            (parts.next(), parts.next(), parts.next())
        else {
            anyhow::bail!("Invalid author format: {value}");
        };

        let timestamp = timestamp
            .parse::<i64>()
            .with_context(|| format!("Invalid timestamp: {timestamp}"))?;
        let offset = parse_offset(timezone).with_context(|| format!("Invalid timezone: {timezone}"))?;

        let (name, email) = identity
            .split_once('<')
            .context("Invalid author format: missing '<'")?;
        let email = email
            .strip_suffix('>')
            .context("Invalid author format: missing '>'")?;

        let timestamp = DateTime::from_timestamp(timestamp, 0)
            .context("Invalid timestamp")?
            .with_timezone(&offset);

        Ok(Author {
            name: name.trim_end().to_string(),
            email: email.to_string(),
            timestamp,
        })
    }
}

/// `+HHMM` / `-HHMM`
fn parse_offset(timezone: &str) -> Option<FixedOffset> {
    let (sign, digits) = match timezone.split_at_checked(1)? {
        ("+", digits) => (1, digits),
        ("-", digits) => (-1, digits),
        _ => return None,
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hours = digits[..2].parse::<i32>().ok()?;
    let minutes = digits[2..].parse::<i32>().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    /// None for the repository's root commit
    parent: Option<ObjectId>,
    tree_oid: ObjectId,
    author: Author,
    committer: Author,
    message: String,
}

impl Commit {
    /// The author doubles as committer.
    pub fn new(parent: Option<ObjectId>, tree_oid: ObjectId, author: Author, message: String) -> Self {
        Commit {
            parent,
            tree_oid,
            committer: author.clone(),
            author,
            message,
        }
    }

    /// First line of the commit message
    pub fn short_message(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parent(&self) -> Option<&ObjectId> {
        self.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn author(&self) -> &Author {
        &self.author
    }
}

impl Packable for Commit {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        Ok(Bytes::from(self.display()))
    }
}

impl Unpackable for Commit {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;

        let (headers, message) = content
            .split_once("\n\n")
            .context("Invalid commit object: missing message separator")?;
        let mut lines = headers.lines();

        let tree_oid = lines
            .next()
            .and_then(|line| line.strip_prefix("tree "))
            .context("Invalid commit object: invalid tree line")?;
        let tree_oid = ObjectId::try_parse(tree_oid)?;

        let mut next_line = lines
            .next()
            .context("Invalid commit object: missing author line")?;
        let parent = match next_line.strip_prefix("parent ") {
            Some(parent) => {
                next_line = lines
                    .next()
                    .context("Invalid commit object: missing author line")?;
                Some(ObjectId::try_parse(parent)?)
            }
            None => None,
        };

        let author = next_line
            .strip_prefix("author ")
            .context("Invalid commit object: invalid author line")?;
        let committer = lines
            .next()
            .and_then(|line| line.strip_prefix("committer "))
            .context("Invalid commit object: invalid committer line")?;

        Ok(Commit {
            parent,
            tree_oid,
            author: Author::try_from(author)?,
            committer: Author::try_from(committer)?,
            message: message.to_string(),
        })
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn display(&self) -> String {
        let mut lines = vec![format!("tree {}", self.tree_oid)];
        if let Some(parent) = &self.parent {
            lines.push(format!("parent {parent}"));
        }
        lines.push(format!("author {}", self.author.display()));
        lines.push(format!("committer {}", self.committer.display()));
        lines.push(String::new());
        lines.push(self.message.clone());

        lines.join("\n")
    }
}
