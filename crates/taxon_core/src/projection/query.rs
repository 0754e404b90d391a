//! Explicit query specification for flat taxon listings.
//!
//! `TaxonQuery` is storage-agnostic: the in-memory engine applies it with
//! [`TaxonQuery::matches`] / [`TaxonQuery::compare`] / [`PagedList::paginate`],
//! and `taxon_postgres::query_builder` translates the same struct to SQL.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::types::Taxon;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaxonSortField {
    #[default]
    Position,
    Name,
    Depth,
    PrettyName,
    CreatedAt,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Filter, sort and page a flat list of taxa. Filters combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxonQuery {
    #[serde(default)]
    pub taxonomy_id: Option<Uuid>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub roots_only: bool,
    /// Case-insensitive substring over name, slug and pretty name.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub min_depth: Option<u32>,
    #[serde(default)]
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub sort: TaxonSortField,
    #[serde(default)]
    pub direction: SortDirection,
    /// 1-indexed.
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl TaxonQuery {
    /// Clamp paging: page ≥ 1, page size in `1..=MAX_PAGE_SIZE`, falling back
    /// to `default_page_size`. Blank searches are dropped.
    pub fn normalized(mut self, default_page_size: u32) -> Self {
        self.page = Some(self.page.unwrap_or(1).max(1));
        self.page_size = Some(
            self.page_size
                .unwrap_or(default_page_size)
                .clamp(1, MAX_PAGE_SIZE),
        );
        self.search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.page_size())
    }

    pub fn matches(&self, taxon: &Taxon) -> bool {
        if let Some(taxonomy_id) = self.taxonomy_id {
            if taxon.taxonomy_id != taxonomy_id {
                return false;
            }
        }
        if let Some(parent_id) = self.parent_id {
            if taxon.parent_id != Some(parent_id) {
                return false;
            }
        }
        if self.roots_only && taxon.parent_id.is_some() {
            return false;
        }
        if let Some(min) = self.min_depth {
            if taxon.depth < min {
                return false;
            }
        }
        if let Some(max) = self.max_depth {
            if taxon.depth > max {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = [&taxon.name, &taxon.slug, &taxon.pretty_name]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }

    /// Ordering for the selected sort field; ties fall back to name then id
    /// so paging is stable.
    pub fn compare(&self, a: &Taxon, b: &Taxon) -> Ordering {
        let primary = match self.sort {
            TaxonSortField::Position => a
                .depth
                .cmp(&b.depth)
                .then_with(|| a.position.cmp(&b.position)),
            TaxonSortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            TaxonSortField::Depth => a.depth.cmp(&b.depth),
            TaxonSortField::PrettyName => a
                .pretty_name
                .to_lowercase()
                .cmp(&b.pretty_name.to_lowercase()),
            TaxonSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    }

    /// Filter, sort and page an in-memory set.
    pub fn apply(&self, taxa: impl IntoIterator<Item = Taxon>) -> (Vec<Taxon>, u64) {
        let mut hits: Vec<Taxon> = taxa.into_iter().filter(|t| self.matches(t)).collect();
        hits.sort_by(|a, b| self.compare(a, b));
        let total = hits.len() as u64;
        let page = hits
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.page_size() as usize)
            .collect();
        (page, total)
    }
}

/// One page of results with navigation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedList<T> {
    pub items: Vec<T>,
    /// 1-indexed.
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl<T> PagedList<T> {
    pub fn new(items: Vec<T>, page: u32, page_size: u32, total_count: u64) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let total_pages = total_count.div_ceil(u64::from(page_size)) as u32;
        Self {
            items,
            page,
            page_size,
            total_count,
            total_pages,
            has_next_page: page < total_pages,
            has_previous_page: page > 1,
        }
    }

    /// Slice a complete, already ordered set.
    pub fn paginate(all: Vec<T>, page: u32, page_size: u32) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let total = all.len() as u64;
        let skip = (page as usize - 1) * page_size as usize;
        let items = all.into_iter().skip(skip).take(page_size as usize).collect();
        Self::new(items, page, page_size, total)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedList<U> {
        PagedList {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_count: self.total_count,
            total_pages: self.total_pages,
            has_next_page: self.has_next_page,
            has_previous_page: self.has_previous_page,
        }
    }
}

/// Row shape of the flat listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonListItem {
    pub id: Uuid,
    pub taxonomy_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub pretty_name: String,
    pub position: i32,
    pub depth: u32,
    pub is_root: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Taxon> for TaxonListItem {
    fn from(t: Taxon) -> Self {
        Self {
            is_root: t.is_root(),
            id: t.id,
            taxonomy_id: t.taxonomy_id,
            parent_id: t.parent_id,
            name: t.name,
            slug: t.slug,
            pretty_name: t.pretty_name,
            position: t.position,
            depth: t.depth,
            created_at: t.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{fixtures::taxon, rebuild};

    #[test]
    fn page_two_of_twenty_five() {
        let list = PagedList::paginate((1..=25).collect::<Vec<u32>>(), 2, 10);
        assert_eq!(list.items.len(), 10);
        assert_eq!(list.items[0], 11);
        assert_eq!(list.total_pages, 3);
        assert!(list.has_next_page);
        assert!(list.has_previous_page);
    }

    #[test]
    fn last_page_is_partial() {
        let list = PagedList::paginate((1..=25).collect::<Vec<u32>>(), 3, 10);
        assert_eq!(list.items, vec![21, 22, 23, 24, 25]);
        assert!(!list.has_next_page);
    }

    #[test]
    fn empty_set_has_no_pages() {
        let list: PagedList<u32> = PagedList::paginate(vec![], 1, 10);
        assert_eq!(list.total_pages, 0);
        assert!(!list.has_next_page);
        assert!(!list.has_previous_page);
    }

    #[test]
    fn normalized_clamps_paging() {
        let q = TaxonQuery {
            page: Some(0),
            page_size: Some(10_000),
            search: Some("   ".into()),
            ..Default::default()
        }
        .normalized(20);
        assert_eq!(q.page, Some(1));
        assert_eq!(q.page_size, Some(MAX_PAGE_SIZE));
        assert_eq!(q.search, None);

        let q = TaxonQuery::default().normalized(15);
        assert_eq!(q.page_size(), 15);
        assert_eq!(q.offset(), 0);
    }

    fn sample() -> Vec<Taxon> {
        let taxonomy_id = Uuid::new_v4();
        let root = taxon(taxonomy_id, None, "Catalog", 0);
        let shoes = taxon(taxonomy_id, Some(root.id), "Shoes", 1);
        let shirts = taxon(taxonomy_id, Some(root.id), "Shirts", 0);
        let boots = taxon(taxonomy_id, Some(shoes.id), "Boots", 0);
        rebuild(vec![root, shoes, shirts, boots]).taxa
    }

    #[test]
    fn search_hits_pretty_name() {
        let taxa = sample();
        let q = TaxonQuery {
            search: Some("shoes".into()),
            ..Default::default()
        };
        let (page, total) = q.apply(taxa);
        assert_eq!(total, 2);
        let names: Vec<&str> = page.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Shoes", "Boots"]);
    }

    #[test]
    fn filters_by_parent_and_depth() {
        let taxa = sample();
        let root_id = taxa[0].id;
        let q = TaxonQuery {
            parent_id: Some(root_id),
            sort: TaxonSortField::Name,
            direction: SortDirection::Desc,
            ..Default::default()
        };
        let (page, _) = q.apply(taxa.clone());
        let names: Vec<&str> = page.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Shoes", "Shirts"]);

        let q = TaxonQuery {
            min_depth: Some(2),
            ..Default::default()
        };
        assert_eq!(q.apply(taxa.clone()).1, 1);

        let q = TaxonQuery {
            roots_only: true,
            ..Default::default()
        };
        assert_eq!(q.apply(taxa).0[0].name, "Catalog");
    }

    #[test]
    fn sort_field_parses_from_query_string_form() {
        use std::str::FromStr;
        assert_eq!(
            TaxonSortField::from_str("pretty_name").unwrap(),
            TaxonSortField::PrettyName
        );
        let name: &str = TaxonSortField::CreatedAt.as_ref();
        assert_eq!(name, "created_at");
    }
}
