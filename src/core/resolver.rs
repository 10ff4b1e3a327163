//! Attributes header-only occurrences to the compiled source that owns them.
//!
//! Resolution order for each header:
//! 1. the explicit header mapping, when it knows the header;
//! 2. an include-graph walk over the search index: a source already in the
//!    table, else any source, else recurse through including headers.
//!
//! The walk keeps a visited set and stops at [`MAX_INCLUDE_DEPTH`], so
//! mutually-including headers terminate with `UnresolvedHeader`.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::ExtensionsConfig;
use crate::error::{Error, Result};
use crate::occurrence::OccurrenceTable;
use crate::search::IncludeIndex;
use crate::strategy::HeaderMapping;

pub const MAX_INCLUDE_DEPTH: usize = 32;

pub struct DependencyResolver<'a> {
    extensions: &'a ExtensionsConfig,
    mapping: Option<&'a dyn HeaderMapping>,
    index: Option<&'a dyn IncludeIndex>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(extensions: &'a ExtensionsConfig) -> Self {
        Self {
            extensions,
            mapping: None,
            index: None,
        }
    }

    pub fn with_mapping(mut self, mapping: &'a dyn HeaderMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn with_index(mut self, index: &'a dyn IncludeIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Records every header in `table` as a dependent of its owning source.
    /// Returns header -> owning source. Any unresolvable header is fatal.
    pub fn attach_owning_sources(
        &self,
        table: &mut OccurrenceTable,
    ) -> Result<BTreeMap<String, String>> {
        let headers: Vec<String> = table
            .paths()
            .into_iter()
            .filter(|path| self.extensions.is_header(path))
            .collect();

        let mut resolved = BTreeMap::new();
        for header in headers {
            let mut visited = BTreeSet::new();
            let owner = self
                .walk(&header, table, &mut visited, 0)?
                .ok_or_else(|| Error::unresolved_header(&header, visited.into_iter().collect()))?;

            log_status!("resolve", "{} -> {}", header, owner);
            table.attach_header(owner.clone(), header.clone());
            resolved.insert(header, owner);
        }

        Ok(resolved)
    }

    fn walk(
        &self,
        header: &str,
        table: &OccurrenceTable,
        visited: &mut BTreeSet<String>,
        depth: usize,
    ) -> Result<Option<String>> {
        if let Some(source) = self.mapping.and_then(|m| m.source_for(header)) {
            return Ok(Some(source));
        }

        let Some(index) = self.index else {
            visited.insert(header.to_string());
            return Ok(None);
        };

        if depth >= MAX_INCLUDE_DEPTH || !visited.insert(header.to_string()) {
            return Ok(None);
        }

        let includers: BTreeSet<String> = index
            .includers(basename(header))?
            .into_iter()
            .filter(|path| path != header)
            .collect();

        let sources: Vec<&String> = includers
            .iter()
            .filter(|path| self.extensions.is_compiled(path))
            .collect();

        if let Some(source) = sources.iter().find(|path| table.contains(path)) {
            return Ok(Some((*source).clone()));
        }
        if let Some(source) = sources.first() {
            return Ok(Some((*source).clone()));
        }

        for parent in includers.iter().filter(|p| self.extensions.is_header(p)) {
            if let Some(source) = self.walk(parent, table, visited, depth + 1)? {
                return Ok(Some(source));
            }
        }

        Ok(None)
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::cell::Cell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FixtureIndex {
        includers: HashMap<String, Vec<String>>,
        queries: Cell<usize>,
    }

    impl FixtureIndex {
        fn with(mut self, basename: &str, paths: &[&str]) -> Self {
            self.includers.insert(
                basename.to_string(),
                paths.iter().map(|p| p.to_string()).collect(),
            );
            self
        }
    }

    impl IncludeIndex for FixtureIndex {
        fn includers(&self, basename: &str) -> Result<Vec<String>> {
            self.queries.set(self.queries.get() + 1);
            Ok(self.includers.get(basename).cloned().unwrap_or_default())
        }
    }

    fn table(paths: &[&str]) -> OccurrenceTable {
        let mut table = OccurrenceTable::new();
        for path in paths {
            table.add_line(*path, 1);
        }
        table
    }

    #[test]
    fn mapping_wins_without_index_queries() {
        let extensions = ExtensionsConfig::default();
        let index = FixtureIndex::default().with("a.h", &["/src/other.cpp"]);
        let mapping = |h: &str| (h == "/src/a.h").then(|| "/src/a.cpp".to_string());
        let mut table = table(&["/src/a.cpp", "/src/a.h"]);

        let resolved = DependencyResolver::new(&extensions)
            .with_mapping(&mapping)
            .with_index(&index)
            .attach_owning_sources(&mut table)
            .unwrap();

        assert_eq!(resolved["/src/a.h"], "/src/a.cpp");
        assert_eq!(index.queries.get(), 0);
        let owner = table.get("/src/a.cpp").unwrap();
        assert!(owner.dependent_headers.contains("/src/a.h"));
    }

    #[test]
    fn prefers_source_already_in_table() {
        let extensions = ExtensionsConfig::default();
        let index = FixtureIndex::default().with("a.h", &["/src/b.cpp", "/src/z.cpp"]);
        let mut table = table(&["/src/a.h", "/src/z.cpp"]);

        let resolved = DependencyResolver::new(&extensions)
            .with_index(&index)
            .attach_owning_sources(&mut table)
            .unwrap();

        assert_eq!(resolved["/src/a.h"], "/src/z.cpp");
    }

    #[test]
    fn falls_back_to_any_source_and_adds_it() {
        let extensions = ExtensionsConfig::default();
        let index = FixtureIndex::default().with("a.h", &["/src/b.cpp"]);
        let mut table = table(&["/src/a.h"]);

        DependencyResolver::new(&extensions)
            .with_index(&index)
            .attach_owning_sources(&mut table)
            .unwrap();

        let owner = table.get("/src/b.cpp").unwrap();
        assert!(owner.lines.is_empty());
        assert!(owner.dependent_headers.contains("/src/a.h"));
    }

    #[test]
    fn recursive_hops_keep_table_preference() {
        let extensions = ExtensionsConfig::default();
        let index = FixtureIndex::default()
            .with("a.h", &["/inc/b.h"])
            .with("b.h", &["/src/x.cpp", "/src/y.cpp"]);
        let mut table = table(&["/inc/a.h", "/src/y.cpp"]);

        let resolved = DependencyResolver::new(&extensions)
            .with_index(&index)
            .attach_owning_sources(&mut table)
            .unwrap();

        assert_eq!(resolved["/inc/a.h"], "/src/y.cpp");
    }

    #[test]
    fn mutual_includes_terminate_unresolved() {
        let extensions = ExtensionsConfig::default();
        let index = FixtureIndex::default()
            .with("a.h", &["/inc/b.h"])
            .with("b.h", &["/inc/a.h"]);
        let mut table = table(&["/inc/a.h"]);

        let err = DependencyResolver::new(&extensions)
            .with_index(&index)
            .attach_owning_sources(&mut table)
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ResolveUnresolvedHeader);
        assert!(index.queries.get() <= 2);
    }

    #[test]
    fn include_chain_stops_at_depth_bound() {
        let extensions = ExtensionsConfig::default();
        let mut index = FixtureIndex::default();
        for i in 0..100 {
            let parent = format!("/inc/h{}.h", i + 1);
            index = index.with(&format!("h{}.h", i), &[parent.as_str()]);
        }
        let mut table = table(&["/inc/h0.h"]);

        let result = DependencyResolver::new(&extensions)
            .with_index(&index)
            .attach_owning_sources(&mut table);

        assert!(result.is_err());
        assert_eq!(index.queries.get(), MAX_INCLUDE_DEPTH);
    }

    #[test]
    fn no_strategy_means_unresolved() {
        let extensions = ExtensionsConfig::default();
        let mut table = table(&["/inc/a.h"]);

        let err = DependencyResolver::new(&extensions)
            .attach_owning_sources(&mut table)
            .unwrap_err();

        assert_eq!(err.details["header"], "/inc/a.h");
    }
}
