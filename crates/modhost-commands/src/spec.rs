//! Command identity: primary name plus aliases.

/// Name, aliases and help text of a command.
///
/// Labels are stored lowercase. Aliases keep insertion order; duplicates and
/// aliases equal to the name are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    name: String,
    aliases: Vec<String>,
    description: String,
    usage: String,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>) -> Self {
        let name = normalize(name.into());
        Self {
            usage: format!("/{}", name),
            name,
            aliases: Vec::new(),
            description: String::new(),
        }
    }

    /// Add several aliases.
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for alias in aliases {
            self.push_alias(alias.into());
        }
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.push_alias(alias.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    fn push_alias(&mut self, alias: String) {
        let alias = normalize(alias);
        if alias.is_empty() || alias == self.name || self.aliases.contains(&alias) {
            return;
        }
        self.aliases.push(alias);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn description_text(&self) -> &str {
        &self.description
    }

    pub fn usage_text(&self) -> &str {
        &self.usage
    }

    /// Name first, then aliases.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

pub(crate) fn normalize(label: String) -> String {
    let trimmed = label.trim();
    if trimmed.len() == label.len() && !label.chars().any(char::is_uppercase) {
        return label;
    }
    trimmed.to_lowercase()
}
