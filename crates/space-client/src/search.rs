//! Search by name, type, and tag over the caller's own Metas and the Metas
//! shared with it.
//!
//! Query terms use the `name:`, `type:`, and `tag:` prefixes; a bare term
//! is a name. A hit scores one point per term it satisfies. Tags are the
//! ones the caller wrote, on own and shared files alike.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use space_chain::BlockEntry;
use space_core::{Meta, RecordHash, SpaceResult, Tag};

use crate::SpaceClient;

/// Predicate over a decrypted Meta.
pub trait MetaFilter {
    fn matches(&self, meta: &Meta) -> bool;

    /// How many of the filter's terms `meta` satisfies.
    fn score(&self, meta: &Meta) -> usize {
        usize::from(self.matches(meta))
    }
}

/// Case-insensitive substring match on the file name.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    names: Vec<String>,
}

impl NameFilter {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }
}

impl MetaFilter for NameFilter {
    fn matches(&self, meta: &Meta) -> bool {
        self.score(meta) > 0
    }

    fn score(&self, meta: &Meta) -> usize {
        let name = meta.name.to_lowercase();
        self.names.iter().filter(|n| name.contains(n.as_str())).count()
    }
}

/// Exact match on the MIME type.
#[derive(Debug, Clone, Default)]
pub struct TypeFilter {
    types: Vec<String>,
}

impl TypeFilter {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            types: types.into_iter().map(|t| t.as_ref().to_string()).collect(),
        }
    }
}

impl MetaFilter for TypeFilter {
    fn matches(&self, meta: &Meta) -> bool {
        self.types.iter().any(|t| t == &meta.mime)
    }
}

/// Exact match on a tag value.
#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    tags: Vec<String>,
}

impl TagFilter {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tags: tags.into_iter().map(|t| t.as_ref().to_string()).collect(),
        }
    }

    pub fn matches(&self, tag: &Tag) -> bool {
        self.tags.iter().any(|t| t == &tag.value)
    }

    fn matched_terms<'t>(&self, tags: &'t [(BlockEntry, Tag)]) -> BTreeSet<&'t str> {
        tags.iter()
            .map(|(_, tag)| tag.value.as_str())
            .filter(|value| self.tags.iter().any(|t| t == value))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub names: Vec<String>,
    pub types: Vec<String>,
    pub tags: Vec<String>,
}

impl SearchQuery {
    pub fn parse<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut query = Self::default();
        for term in terms {
            let term = term.as_ref();
            if let Some(tag) = term.strip_prefix("tag:") {
                query.tags.push(tag.to_string());
            } else if let Some(mime) = term.strip_prefix("type:") {
                query.types.push(mime.to_string());
            } else {
                let name = term.strip_prefix("name:").unwrap_or(term);
                query.names.push(name.to_string());
            }
        }
        query
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.types.is_empty() && self.tags.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub entry: BlockEntry,
    pub meta: Meta,
    /// Alias that shared the file, `None` for the caller's own.
    pub shared_by: Option<String>,
    /// Number of query terms this file satisfied.
    pub matches: usize,
}

impl SearchHit {
    pub fn meta_id(&self) -> RecordHash {
        self.entry.record_hash
    }

    /// Most matches first, then newest, then by id.
    fn rank(&self, other: &Self) -> Ordering {
        other
            .matches
            .cmp(&self.matches)
            .then_with(|| other.entry.record.timestamp.cmp(&self.entry.record.timestamp))
            .then_with(|| self.entry.record_hash.cmp(&other.entry.record_hash))
    }
}

/// A Meta the caller can read, with the alias that shared it if any.
struct Candidate {
    entry: BlockEntry,
    meta: Meta,
    shared_by: Option<String>,
}

impl SpaceClient {
    /// Own Metas newest first, then shared Metas newest share first.
    fn candidates(&self) -> SpaceResult<Vec<Candidate>> {
        let mut out = Vec::new();
        for item in self.metas()? {
            let (entry, meta) = item?;
            out.push(Candidate {
                entry,
                meta,
                shared_by: None,
            });
        }
        for shared in self.shared_metas()? {
            out.push(Candidate {
                entry: shared.entry,
                meta: shared.meta,
                shared_by: Some(shared.owner),
            });
        }
        Ok(out)
    }

    /// Readable Metas accepted by `filter`: own ones newest first, then
    /// shared ones.
    pub fn search_meta(&self, filter: &dyn MetaFilter) -> SpaceResult<Vec<(BlockEntry, Meta)>> {
        Ok(self
            .candidates()?
            .into_iter()
            .filter(|c| filter.matches(&c.meta))
            .map(|c| (c.entry, c.meta))
            .collect())
    }

    /// Readable Metas carrying at least one of the caller's tags accepted
    /// by `filter`. Each Meta appears once however many of its tags match.
    pub fn search_tag(&self, filter: &TagFilter) -> SpaceResult<Vec<(BlockEntry, Meta)>> {
        let mut out = Vec::new();
        for candidate in self.candidates()? {
            let tags = self.tags_for_hash(&candidate.entry.record_hash)?;
            if tags.iter().any(|(_, tag)| filter.matches(tag)) {
                out.push((candidate.entry, candidate.meta));
            }
        }
        Ok(out)
    }

    /// Ranked search combining every term of `query`.
    pub fn search(&self, query: &SearchQuery) -> SpaceResult<Vec<SearchHit>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let names = NameFilter::new(&query.names);
        let types = TypeFilter::new(&query.types);
        let tags = TagFilter::new(&query.tags);

        let mut hits: HashMap<RecordHash, SearchHit> = HashMap::new();
        for Candidate {
            entry,
            meta,
            shared_by,
        } in self.candidates()?
        {
            let mut matches = names.score(&meta) + types.score(&meta);
            if !query.tags.is_empty() {
                let own_tags = self.tags_for_hash(&entry.record_hash)?;
                matches += tags.matched_terms(&own_tags).len();
            }
            if matches > 0 {
                hits.entry(entry.record_hash).or_insert(SearchHit {
                    entry,
                    meta,
                    shared_by,
                    matches,
                });
            }
        }

        let mut hits: Vec<SearchHit> = hits.into_values().collect();
        hits.sort_by(SearchHit::rank);
        tracing::debug!(terms = ?query, hits = hits.len(), "search complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str, mime: &str) -> Meta {
        Meta {
            name: name.to_string(),
            mime: mime.to_string(),
            size: 0,
        }
    }

    #[test]
    fn test_parse_prefixes() {
        let query = SearchQuery::parse(["report", "name:Q3", "type:text/plain", "tag:work"]);
        assert_eq!(query.names, vec!["report", "Q3"]);
        assert_eq!(query.types, vec!["text/plain"]);
        assert_eq!(query.tags, vec!["work"]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(SearchQuery::parse(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_name_filter_case_insensitive_substring() {
        let filter = NameFilter::new(["REPORT"]);
        assert!(filter.matches(&meta("q3-report.txt", "text/plain")));
        assert!(!filter.matches(&meta("notes.txt", "text/plain")));
    }

    #[test]
    fn test_name_filter_scores_each_term() {
        let filter = NameFilter::new(["q3", "report", "budget"]);
        assert_eq!(filter.score(&meta("q3-report.txt", "text/plain")), 2);
    }

    #[test]
    fn test_name_filter_ignores_empty_terms() {
        let filter = NameFilter::new([""]);
        assert!(!filter.matches(&meta("anything", "text/plain")));
    }

    #[test]
    fn test_type_filter_exact() {
        let filter = TypeFilter::new(["text/plain"]);
        assert!(filter.matches(&meta("a", "text/plain")));
        assert!(!filter.matches(&meta("a", "text/plain; charset=utf-8")));
        assert_eq!(filter.score(&meta("a", "image/png")), 0);
    }

    #[test]
    fn test_tag_filter() {
        let filter = TagFilter::new(["work", "urgent"]);
        assert!(filter.matches(&Tag {
            value: "urgent".into()
        }));
        assert!(!filter.matches(&Tag {
            value: "Urgent".into()
        }));
    }
}
