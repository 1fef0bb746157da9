use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A named hex payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    /// Hex text as the user wrote it; decoded only when sent
    pub payload: String,
}

impl Command {
    pub fn new(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

/// Ordered set of commands keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandLibrary {
    commands: Vec<Command>,
}

impl CommandLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a library from config entries; later duplicates win
    pub fn from_commands(commands: impl IntoIterator<Item = Command>) -> Self {
        let mut library = Self::new();
        for command in commands {
            if let Err(e) = library.upsert(&command.name, &command.payload) {
                tracing::warn!("Skipping command entry: {}", e);
            }
        }
        library
    }

    /// Add a command, or replace the payload of the one with the same name.
    ///
    /// Returns `true` when an existing entry was updated. The payload is not
    /// validated as hex here.
    pub fn upsert(&mut self, name: &str, payload: &str) -> Result<bool> {
        let name = name.trim();
        let payload = payload.trim();
        if name.is_empty() || payload.is_empty() {
            return Err(Error::Other(
                "command name and payload must not be empty".to_string(),
            ));
        }

        if let Some(existing) = self.commands.iter_mut().find(|c| c.name == name) {
            existing.payload = payload.to_string();
            return Ok(true);
        }

        self.commands.push(Command::new(name, payload));
        Ok(false)
    }

    pub fn remove(&mut self, name: &str) -> Option<Command> {
        let index = self.commands.iter().position(|c| c.name == name.trim())?;
        Some(self.commands.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name.trim())
    }

    /// Like [`get`](Self::get) but a missing name is an error
    pub fn require(&self, name: &str) -> Result<&Command> {
        self.get(name)
            .ok_or_else(|| Error::CommandNotFound(name.trim().to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let commands: Vec<Command> = serde_json::from_str(json)?;
        Ok(Self::from_commands(commands))
    }
}

impl<'a> IntoIterator for &'a CommandLibrary {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
