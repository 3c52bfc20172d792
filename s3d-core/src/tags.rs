//! Metadata tags collected from several media objects

/// Ordered list of `(name, value)` tags.
///
/// Tags from different media objects are appended in object order. Duplicate
/// names are kept as separate entries, so per-eye differences survive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagList {
    entries: Vec<(String, String)>,
}

impl TagList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends all tags of one media object, preserving their order
    pub fn extend_from<'a, I>(&mut self, tags: I)
    where
        I: IntoIterator<Item = &'a (String, String)>,
    {
        self.entries.extend(tags.into_iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn name(&self, i: usize) -> &str {
        &self.entries[i].0
    }

    pub fn value(&self, i: usize) -> &str {
        &self.entries[i].1
    }

    /// Value of the first tag with the given name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_duplicates_are_kept_in_object_order() {
        let mut list = TagList::new();
        list.extend_from(&tags(&[("title", "Left"), ("encoder", "x264")]));
        list.extend_from(&tags(&[("title", "Right")]));

        assert_eq!(list.len(), 3);
        assert_eq!(list.name(2), "title");
        assert_eq!(list.value(2), "Right");
        assert_eq!(list.get("title"), Some("Left"));
        assert_eq!(list.get("artist"), None);
        assert_eq!(list.iter().count(), 3);
    }
}
