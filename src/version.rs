use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// One dot-separated component. Textual components sort before numbers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum VersionToken {
    Text(String),
    Number(u64),
}

/// A Foreman version such as `1.15.6` or `1.16.0-RC1`.
///
/// The first `-` separates a pre-release suffix and is treated like a dot, so
/// `1.16.0-RC1` compares as `(1, 16, 0, "RC1")`.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    tokens: Vec<VersionToken>,
}

impl Version {
    pub fn parse(raw: &str) -> Self {
        let tokens = raw
            .replacen('-', ".", 1)
            .split('.')
            .map(|token| match token.parse::<u64>() {
                Ok(number) => VersionToken::Number(number),
                Err(_) => VersionToken::Text(token.to_string()),
            })
            .collect();

        Self {
            raw: raw.to_string(),
            tokens,
        }
    }

    pub fn tokens(&self) -> &[VersionToken] {
        &self.tokens
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn major(&self) -> Option<&VersionToken> {
        self.tokens.first()
    }

    pub fn same_minor(&self, other: &Version) -> bool {
        let end = |version: &Version| version.tokens.len().min(2);
        self.tokens[..end(self)] == other.tokens[..end(other)]
    }
}

impl FromStr for Version {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(raw))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tokens.cmp(&other.tokens)
    }
}
