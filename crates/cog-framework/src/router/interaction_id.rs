//! Component custom ids: `command.id.params...`.

use std::fmt;

/// A parsed component custom id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionId {
    pub command: String,
    pub id: Option<String>,
    pub params: Vec<String>,
}

impl InteractionId {
    /// Splits a custom id on `.`; the first segment names the command.
    pub fn parse(custom_id: &str) -> Option<Self> {
        let mut path = custom_id.split('.');
        let command = path.next().filter(|c| !c.is_empty())?.to_lowercase();
        let id = path.next().map(str::to_string);
        Some(Self {
            command,
            id,
            params: path.map(str::to_string).collect(),
        })
    }

    /// All segments, command first.
    pub fn path(&self) -> Vec<String> {
        let mut path = vec![self.command.clone()];
        path.extend(self.id.iter().cloned());
        path.extend(self.params.iter().cloned());
        path
    }
}

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path().join("."))
    }
}

/// Builds custom ids for one command's components.
#[derive(Debug, Clone)]
pub struct InteractionIdGenerator {
    command: String,
}

impl InteractionIdGenerator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into().to_lowercase(),
        }
    }

    pub fn generate(&self, id: &str, params: &[&str]) -> String {
        let mut segments = vec![self.command.as_str()];
        if !id.is_empty() {
            segments.push(id);
        }
        segments.extend_from_slice(params);
        segments.join(".")
    }

    pub fn button(&self, id: &str, params: &[&str]) -> String {
        self.generate(id, params)
    }

    pub fn select_menu(&self, id: &str, params: &[&str]) -> String {
        self.generate(id, params)
    }

    pub fn modal(&self, id: &str, params: &[&str]) -> String {
        self.generate(id, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_parse() {
        let generator = InteractionIdGenerator::new("Poll");
        let custom_id = generator.button("vote", &["42", "yes"]);
        assert_eq!(custom_id, "poll.vote.42.yes");

        let parsed = InteractionId::parse(&custom_id).unwrap();
        assert_eq!(parsed.command, "poll");
        assert_eq!(parsed.id.as_deref(), Some("vote"));
        assert_eq!(parsed.params, vec!["42", "yes"]);
        assert_eq!(parsed.to_string(), custom_id);
    }

    #[test]
    fn test_parse_bare_command() {
        let parsed = InteractionId::parse("help").unwrap();
        assert_eq!(parsed.id, None);
        assert!(parsed.params.is_empty());
        assert!(InteractionId::parse("").is_none());
        assert!(InteractionId::parse(".x").is_none());
    }
}
