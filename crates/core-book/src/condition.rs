//! Predicates over entry keys.
//!
//! A [`Condition`] is a shareable predicate with `and` / `or` / `not`
//! combinators; [`ConditionBuilder`] assembles one from optional name, path
//! and type constraints. Name and path accept either a literal (exact match)
//! or a regular expression; constraints combine conjunctively.

use std::any::TypeId;
use std::sync::Arc;

use regex::Regex;

use crate::entry::EntryKey;

/// Shareable predicate over [`EntryKey`].
#[derive(Clone)]
pub struct Condition {
    filter: Arc<dyn Fn(&EntryKey) -> bool + Send + Sync>,
}

impl Default for Condition {
    fn default() -> Self {
        Self::always()
    }
}

impl Condition {
    /// Matches every key.
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    pub fn new(filter: impl Fn(&EntryKey) -> bool + Send + Sync + 'static) -> Self {
        Self {
            filter: Arc::new(filter),
        }
    }

    pub fn matches(&self, key: &EntryKey) -> bool {
        (self.filter)(key)
    }

    pub fn and(&self, rhs: &Condition) -> Condition {
        let (lhs, rhs) = (self.filter.clone(), rhs.filter.clone());
        Condition::new(move |key| lhs(key) && rhs(key))
    }

    pub fn or(&self, rhs: &Condition) -> Condition {
        let (lhs, rhs) = (self.filter.clone(), rhs.filter.clone());
        Condition::new(move |key| lhs(key) || rhs(key))
    }

    pub fn not(&self) -> Condition {
        let inner = self.filter.clone();
        Condition::new(move |key| !inner(key))
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Condition(..)")
    }
}

#[derive(Clone)]
enum TextMatch {
    Literal(String),
    Pattern(Regex),
}

impl TextMatch {
    fn matches(&self, text: &str) -> bool {
        match self {
            TextMatch::Literal(lit) => lit == text,
            TextMatch::Pattern(rgx) => rgx.is_match(text),
        }
    }
}

/// Builder composing name / path / type constraints conjunctively.
#[derive(Clone, Default)]
pub struct ConditionBuilder {
    name: Option<TextMatch>,
    path: Option<TextMatch>,
    type_id: Option<TypeId>,
}

impl ConditionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact name match.
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(TextMatch::Literal(name.into()));
        self
    }

    pub fn set_name_regex(mut self, pattern: Regex) -> Self {
        self.name = Some(TextMatch::Pattern(pattern));
        self
    }

    /// Exact path match (including the trailing `/`).
    pub fn set_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(TextMatch::Literal(path.into()));
        self
    }

    pub fn set_path_regex(mut self, pattern: Regex) -> Self {
        self.path = Some(TextMatch::Pattern(pattern));
        self
    }

    pub fn set_type<T: 'static>(self) -> Self {
        self.set_type_id(TypeId::of::<T>())
    }

    pub fn set_type_id(mut self, type_id: TypeId) -> Self {
        self.type_id = Some(type_id);
        self
    }

    pub fn build(self) -> Condition {
        let Self {
            name,
            path,
            type_id,
        } = self;
        Condition::new(move |key| {
            if let Some(matcher) = &name
                && !matcher.matches(&key.name)
            {
                return false;
            }
            if let Some(matcher) = &path
                && !matcher.matches(&key.path)
            {
                return false;
            }
            if let Some(expected) = type_id
                && expected != key.type_id
            {
                return false;
            }
            true
        })
    }
}

impl From<ConditionBuilder> for Condition {
    fn from(builder: ConditionBuilder) -> Self {
        builder.build()
    }
}
