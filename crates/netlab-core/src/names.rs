//! Unique node name allocation within a project.
//!
//! [`NameAllocator`] hands out human-readable node names. A base name that is
//! free is used as-is; a taken one is turned into a template (`{0}` / `{id}`)
//! or suffixed with an increasing integer until an unused candidate is found.
//! The search is bounded by a policy limit rather than running forever.

use std::collections::HashSet;

use crate::error::CoreError;

/// Default upper bound (exclusive) of the numeric search space.
pub const DEFAULT_NAME_SEARCH_LIMIT: u32 = 1_000_000;

/// Highest application id a node kind requiring one may receive.
pub const MAX_APPLICATION_ID: u32 = 512;

/// The set of node names currently referenced by live nodes.
#[derive(Debug, Clone)]
pub struct NameAllocator {
    allocated: HashSet<String>,
    search_limit: u32,
}

impl Default for NameAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::with_search_limit(DEFAULT_NAME_SEARCH_LIMIT)
    }

    /// Creates an allocator that tries the numbers `1..search_limit`.
    pub fn with_search_limit(search_limit: u32) -> Self {
        NameAllocator {
            allocated: HashSet::new(),
            search_limit,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.allocated.contains(name)
    }

    pub fn len(&self) -> usize {
        self.allocated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocated.is_empty()
    }

    pub fn clear(&mut self) {
        self.allocated.clear();
    }

    /// Allocates a unique name derived from `base_name` and records it.
    pub fn allocate(&mut self, base_name: &str) -> Result<String, CoreError> {
        let mut base: String = base_name.chars().filter(|c| *c != ' ').collect();
        if self.allocated.contains(&base) {
            base = templatize_trailing_digits(&base);
        }

        if base.contains("{0}") || base.contains("{id}") {
            for number in 1..self.search_limit {
                let name = expand_template(&base, number)?;
                if self.allocated.insert(name.clone()) {
                    return Ok(name);
                }
            }
        } else {
            if self.allocated.insert(base.clone()) {
                return Ok(base);
            }
            for number in 1..self.search_limit {
                let name = format!("{base}{number}");
                if self.allocated.insert(name.clone()) {
                    return Ok(name);
                }
            }
        }
        Err(CoreError::NameSpaceExhausted)
    }

    /// Releases a name. Releasing an unknown name is a no-op.
    pub fn release(&mut self, name: &str) {
        self.allocated.remove(name);
    }

    /// Renames `old` to a fresh allocation of `new`. Unchanged names are kept.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<String, CoreError> {
        if new.is_empty() || old == new {
            return Ok(old.to_string());
        }
        self.release(old);
        self.allocate(new)
    }
}

/// Replaces a run of trailing digits by the positional `{0}` marker.
fn templatize_trailing_digits(name: &str) -> String {
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if stem.len() == name.len() {
        name.to_string()
    } else {
        format!("{stem}{{0}}")
    }
}

/// Substitutes `number` into a name template.
///
/// Supported fields: `{}` / `{0}` / `{id}` (the number) and `{name}` (the
/// literal `Node`). `{{` and `}}` escape braces.
pub fn expand_template(template: &str, number: u32) -> Result<String, CoreError> {
    let malformed = || CoreError::MalformedTemplate {
        template: template.to_string(),
    };

    let mut out = String::with_capacity(template.len() + 4);
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return Err(malformed()),
                        Some(other) => field.push(other),
                    }
                }
                match field.as_str() {
                    "" | "0" | "id" => out.push_str(&number.to_string()),
                    "name" => out.push_str("Node"),
                    f if f.chars().all(|c| c.is_ascii_digit()) => return Err(malformed()),
                    f => {
                        return Err(CoreError::InvalidPlaceholder {
                            placeholder: f.to_string(),
                        })
                    }
                }
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(malformed()),
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Returns the smallest application id in `1..=512` not present in `used`.
pub fn next_application_id(used: impl IntoIterator<Item = u32>) -> Result<u32, CoreError> {
    let used: HashSet<u32> = used.into_iter().collect();
    (1..=MAX_APPLICATION_ID)
        .find(|id| !used.contains(id))
        .ok_or(CoreError::ApplicationIdExhausted {
            max: MAX_APPLICATION_ID,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn free_base_name_is_used_as_is() {
        let mut names = NameAllocator::new();
        assert_eq!(names.allocate("R1").unwrap(), "R1");
        assert!(names.contains("R1"));
    }

    #[test]
    fn spaces_are_stripped() {
        let mut names = NameAllocator::new();
        assert_eq!(names.allocate("Edge Router").unwrap(), "EdgeRouter");
    }

    #[test]
    fn taken_name_with_trailing_digits_is_renumbered() {
        let mut names = NameAllocator::new();
        names.allocate("R1").unwrap();
        assert_eq!(names.allocate("R1").unwrap(), "R2");
        assert_eq!(names.allocate("R1").unwrap(), "R3");
    }

    #[test]
    fn taken_name_without_digits_gets_a_suffix() {
        let mut names = NameAllocator::new();
        names.allocate("PC").unwrap();
        assert_eq!(names.allocate("PC").unwrap(), "PC1");
        assert_eq!(names.allocate("PC").unwrap(), "PC2");
    }

    #[test]
    fn template_expands_to_increasing_numbers() {
        let mut names = NameAllocator::new();
        assert_eq!(names.allocate("Router-{0}").unwrap(), "Router-1");
        assert_eq!(names.allocate("Router-{0}").unwrap(), "Router-2");
        assert_eq!(names.allocate("Switch{id}").unwrap(), "Switch1");
    }

    #[test]
    fn unknown_placeholder_is_a_conflict() {
        let mut names = NameAllocator::new();
        let err = names.allocate("R-{0}-{site}").unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidPlaceholder {
                placeholder: "site".into()
            }
        );
        assert_eq!(
            err.to_string(),
            "{site} is not a valid replacement string in the node name"
        );
    }

    #[test]
    fn unbalanced_template_is_malformed() {
        let mut names = NameAllocator::new();
        assert!(matches!(
            names.allocate("R-{0"),
            Err(CoreError::MalformedTemplate { .. })
        ));
        assert!(matches!(
            names.allocate("R-{id}}"),
            Err(CoreError::MalformedTemplate { .. })
        ));
        assert!(matches!(
            names.allocate("R-{id}-{3}"),
            Err(CoreError::MalformedTemplate { .. })
        ));
    }

    #[test]
    fn escaped_braces_survive_expansion() {
        assert_eq!(expand_template("{{x}}-{0}", 4).unwrap(), "{x}-4");
        assert_eq!(expand_template("{name}-{}", 2).unwrap(), "Node-2");
    }

    #[test]
    fn exhausting_the_template_space_is_reported() {
        let mut names = NameAllocator::with_search_limit(4);
        for expected in ["R-1", "R-2", "R-3"] {
            assert_eq!(names.allocate("R-{0}").unwrap(), expected);
        }
        assert_eq!(names.allocate("R-{0}"), Err(CoreError::NameSpaceExhausted));
    }

    #[test]
    fn exhausting_the_suffix_space_is_reported() {
        let mut names = NameAllocator::with_search_limit(3);
        for expected in ["PC", "PC1", "PC2"] {
            assert_eq!(names.allocate("PC").unwrap(), expected);
        }
        assert_eq!(names.allocate("PC"), Err(CoreError::NameSpaceExhausted));
    }

    #[test]
    fn release_is_idempotent_and_frees_the_name() {
        let mut names = NameAllocator::new();
        names.allocate("R1").unwrap();
        names.release("R1");
        names.release("R1");
        assert!(names.is_empty());
        assert_eq!(names.allocate("R1").unwrap(), "R1");
    }

    #[test]
    fn rename_reallocates_and_keeps_unchanged_names() {
        let mut names = NameAllocator::new();
        names.allocate("R1").unwrap();
        assert_eq!(names.rename("R1", "R1").unwrap(), "R1");
        assert!(names.contains("R1"));

        assert_eq!(names.rename("R1", "Core").unwrap(), "Core");
        assert!(!names.contains("R1"));
        assert!(names.contains("Core"));
    }

    #[test]
    fn application_ids_fill_the_lowest_gap() {
        assert_eq!(next_application_id(vec![]).unwrap(), 1);
        assert_eq!(next_application_id(vec![1, 2, 4]).unwrap(), 3);
        let all: Vec<u32> = (1..=MAX_APPLICATION_ID).collect();
        assert_eq!(
            next_application_id(all),
            Err(CoreError::ApplicationIdExhausted { max: 512 })
        );
    }

    proptest! {
        #[test]
        fn allocated_names_are_never_reused(bases in proptest::collection::vec("[A-Za-z]{1,3}[0-9]{0,2}", 1..40)) {
            let mut names = NameAllocator::new();
            let mut seen = HashSet::new();
            for base in &bases {
                let name = names.allocate(base).unwrap();
                prop_assert!(seen.insert(name));
            }
            prop_assert_eq!(names.len(), bases.len());
        }
    }
}
