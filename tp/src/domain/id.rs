//! Session ID generation
//!
//! IDs use the format: `{12-char-hex}-{kind}-{slug}`
//! Example: `8f3a61c2d07e-trip-rome`

/// Generate an ID from a kind and a human label (usually the destination)
pub fn generate_id(kind: &str, label: &str) -> String {
    let uuid = uuid::Uuid::now_v7().simple().to_string();
    // The leading bits of a v7 UUID are a millisecond timestamp; the tail is random
    let hex_suffix = &uuid[uuid.len() - 12..];
    let slug = slugify(label);
    if slug.is_empty() {
        format!("{}-{}", hex_suffix, kind)
    } else {
        format!("{}-{}-{}", hex_suffix, kind, slug)
    }
}

/// Slugify a label for use in IDs
fn slugify(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Planning session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Create a fresh session ID labelled with the destination
    pub fn new(destination: &str) -> Self {
        Self(generate_id("trip", destination))
    }

    /// Get the full ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the slug portion (after the kind), if any
    pub fn slug(&self) -> Option<&str> {
        let parts: Vec<&str> = self.0.splitn(3, '-').collect();
        parts.get(2).copied()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for SessionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for SessionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self(s))
    }
}
