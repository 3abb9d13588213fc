//! Case-insensitive grouping of records by a text field

use std::collections::HashMap;

use serde::Serialize;

/// A distinct name and how many items carried it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCount {
    pub name: String,
    pub count: usize,
}

/// Counts items per distinct value of `key`
///
/// Values are trimmed and compared case-insensitively. The reported name is
/// the first spelling encountered; blank values are skipped.
///
/// # Returns
///
/// Groups sorted by lower-cased name, ascending.
///
/// # Example
///
/// ```
/// use sosfeed::aggregate::group_count;
///
/// let names = ["A", "a", " b ", ""];
/// let groups = group_count(&names, |name| *name);
///
/// assert_eq!(groups.len(), 2);
/// assert_eq!((groups[0].name.as_str(), groups[0].count), ("A", 2));
/// assert_eq!((groups[1].name.as_str(), groups[1].count), ("b", 1));
/// ```
pub fn group_count<T, F>(items: &[T], key: F) -> Vec<NameCount>
where
    F: Fn(&T) -> &str,
{
    let mut groups: HashMap<String, NameCount> = HashMap::new();

    for item in items {
        let name = key(item).trim();
        if name.is_empty() {
            continue;
        }
        groups
            .entry(name.to_lowercase())
            .and_modify(|group| group.count += 1)
            .or_insert_with(|| NameCount {
                name: name.to_string(),
                count: 1,
            });
    }

    let mut groups: Vec<(String, NameCount)> = groups.into_iter().collect();
    groups.sort_by(|a, b| a.0.cmp(&b.0));
    groups.into_iter().map(|(_, group)| group).collect()
}
