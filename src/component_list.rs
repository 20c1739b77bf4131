//! Ordered, named list of pipeline stages.
//!
//! Builders keep every chain (visitors, event emitters, node deserializers,
//! node type resolvers) in a `ComponentList` so users can put their own stage
//! before, after or instead of a built-in one.

use std::fmt;

/// Where a stage goes relative to the existing ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position<'a> {
    First,
    Last,
    Before(&'a str),
    After(&'a str),
    /// Replace the named stage, keeping its place.
    InsteadOf(&'a str),
}

/// A stage name that is not registered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownComponent(pub String);

impl fmt::Display for UnknownComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no pipeline stage named `{}`", self.0)
    }
}

impl std::error::Error for UnknownComponent {}

pub struct ComponentList<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for ComponentList<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> ComponentList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_of(&self, name: &str) -> Result<usize, UnknownComponent> {
        self.entries
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| UnknownComponent(name.to_owned()))
    }

    pub fn push<S: Into<String>>(&mut self, name: S, component: T) {
        self.entries.push((name.into(), component));
    }

    pub fn insert<S: Into<String>>(
        &mut self,
        position: Position<'_>,
        name: S,
        component: T,
    ) -> Result<(), UnknownComponent> {
        let entry = (name.into(), component);
        match position {
            Position::First => self.entries.insert(0, entry),
            Position::Last => self.entries.push(entry),
            Position::Before(anchor) => {
                let i = self.index_of(anchor)?;
                self.entries.insert(i, entry);
            }
            Position::After(anchor) => {
                let i = self.index_of(anchor)?;
                self.entries.insert(i + 1, entry);
            }
            Position::InsteadOf(anchor) => {
                let i = self.index_of(anchor)?;
                self.entries[i] = entry;
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<T, UnknownComponent> {
        let i = self.index_of(name)?;
        Ok(self.entries.remove(i).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn into_components(self) -> Vec<T> {
        self.entries.into_iter().map(|(_, c)| c).collect()
    }
}

impl<T: Clone> Clone for ComponentList<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> ComponentList<u8> {
        let mut l = ComponentList::new();
        l.push("null", 1);
        l.push("scalar", 2);
        l.push("object", 3);
        l
    }

    #[test]
    fn insert_relative_to_named_stage() {
        let mut l = list();
        l.insert(Position::Before("scalar"), "custom", 9).unwrap();
        l.insert(Position::After("object"), "tail", 10).unwrap();
        let names: Vec<_> = l.names().collect();
        assert_eq!(names, ["null", "custom", "scalar", "object", "tail"]);
    }

    #[test]
    fn replace_keeps_position() {
        let mut l = list();
        l.insert(Position::InsteadOf("scalar"), "scalar2", 7).unwrap();
        assert_eq!(l.into_components(), vec![1, 7, 3]);
    }

    #[test]
    fn unknown_stage_is_reported() {
        let mut l = list();
        assert_eq!(
            l.insert(Position::After("nope"), "x", 0),
            Err(UnknownComponent("nope".into()))
        );
        assert!(l.remove("nope").is_err());
        assert_eq!(l.remove("null").unwrap(), 1);
        assert!(!l.contains("null"));
        assert!(l.contains("scalar"));
    }
}
