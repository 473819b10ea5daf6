//! Hierarchical event tags.
//!
//! Tags are dot-separated paths like `ability.fire.fireball`. A tag's
//! ancestors are its prefixes (`ability.fire`, `ability`), from most to
//! least specific; definition lookup walks them when no exact match is
//! registered.

use std::fmt;
use std::sync::Arc;

/// A dot-separated hierarchical tag naming an event or flow.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FlowTag(Arc<str>);

impl FlowTag {
    /// Create a tag from its dotted path.
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self(Arc::from(path))
    }

    /// The dotted path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of dots; higher means more specific.
    #[must_use]
    pub fn specificity(&self) -> usize {
        self.0.matches('.').count()
    }

    /// The immediate parent tag, if any.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0.rfind('.').map(|dot| Self::new(&self.0[..dot]))
    }

    /// Ancestors from most specific to least (`a.b.c` yields `a.b`, `a`).
    pub fn ancestors(&self) -> impl Iterator<Item = Self> + '_ {
        let mut current = self.parent();
        std::iter::from_fn(move || {
            let next = current.take()?;
            current = next.parent();
            Some(next)
        })
    }
}

impl From<&str> for FlowTag {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl fmt::Debug for FlowTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlowTag({})", self.0)
    }
}

impl fmt::Display for FlowTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestors_most_specific_first() {
        let tag = FlowTag::new("ability.fire.fireball");
        let ancestors: Vec<_> = tag.ancestors().map(|t| t.as_str().to_owned()).collect();
        assert_eq!(ancestors, vec!["ability.fire", "ability"]);
    }

    #[test]
    fn test_root_has_no_ancestors() {
        let tag = FlowTag::new("ability");
        assert_eq!(tag.ancestors().count(), 0);
        assert!(tag.parent().is_none());
    }

    #[test]
    fn test_specificity() {
        assert_eq!(FlowTag::new("a").specificity(), 0);
        assert_eq!(FlowTag::new("a.b.c").specificity(), 2);
        // Ancestors come out in descending specificity already.
        let tag = FlowTag::new("a.b.c.d");
        let specs: Vec<_> = tag.ancestors().map(|t| t.specificity()).collect();
        assert_eq!(specs, vec![2, 1, 0]);
    }
}
