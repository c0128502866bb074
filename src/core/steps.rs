//! Task groups: named, ordered batches of shell commands

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A named batch of commands that run concurrently
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGroup {
    pub name: String,
    pub commands: Vec<String>,
}

/// Ordered mapping from task-group name to its commands
///
/// Order is the order the groups appear in the configuration file and is
/// the order they execute in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Steps {
    groups: Vec<TaskGroup>,
}

impl Steps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group (replacing the commands of an existing group with the same name)
    pub fn with_group<I, S>(mut self, name: &str, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name.to_string(), commands.into_iter().map(Into::into).collect());
        self
    }

    fn insert(&mut self, name: String, commands: Vec<String>) {
        match self.groups.iter_mut().find(|g| g.name == name) {
            Some(group) => group.commands = commands,
            None => self.groups.push(TaskGroup { name, commands }),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TaskGroup> {
        self.groups.iter()
    }

    pub fn get(&self, name: &str) -> Option<&TaskGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of commands across all groups
    pub fn command_count(&self) -> usize {
        self.groups.iter().map(|g| g.commands.len()).sum()
    }
}

impl<'a> IntoIterator for &'a Steps {
    type Item = &'a TaskGroup;
    type IntoIter = std::slice::Iter<'a, TaskGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

impl Serialize for Steps {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for group in &self.groups {
            map.serialize_entry(&group.name, &group.commands)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Steps {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(StepsVisitor)
    }
}

struct StepsVisitor;

impl<'de> Visitor<'de> for StepsVisitor {
    type Value = Steps;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a mapping of task group names to command lists")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Steps, M::Error> {
        let mut steps = Steps::new();
        while let Some((name, commands)) = access.next_entry::<String, GroupCommands>()? {
            if steps.get(&name).is_some() {
                return Err(serde::de::Error::custom(format!(
                    "duplicate task group `{}`",
                    name
                )));
            }
            steps.insert(name, commands.0);
        }
        Ok(steps)
    }
}

/// Commands of a group: either a list or a single string
struct GroupCommands(Vec<String>);

impl<'de> Deserialize<'de> for GroupCommands {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::One(command) => GroupCommands(vec![command]),
            Raw::Many(commands) => GroupCommands(commands),
        })
    }
}
