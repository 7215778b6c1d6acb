use crate::error::{ReallocationError, Result};
use crate::normalize::{normalize_text, split_keywords};
use crate::schema::CategoryRow;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    /// Normalized name, unique within an index.
    pub key: String,
    pub name: String,
    pub budget: f64,
    pub keywords: Vec<String>,
    pub family: Option<String>,
}

impl Category {
    pub fn shares_family_with(&self, other: &Category) -> bool {
        match (&self.family, &other.family) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// What an external classifier is told about one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub keywords: Vec<String>,
}

/// Categories keyed by normalized name, iterated in source-row order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryIndex {
    categories: Vec<Category>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl CategoryIndex {
    /// Validates every row and builds the index. The first invalid row aborts
    /// the whole build.
    pub fn build(rows: &[CategoryRow]) -> Result<Self> {
        let mut index = CategoryIndex::default();

        for (idx, row) in rows.iter().enumerate() {
            let row_number = idx + 1;
            let key = normalize_text(&row.name);

            if key.is_empty() {
                return Err(ReallocationError::EmptyCategoryName { row: row_number });
            }

            if index.positions.contains_key(&key) {
                return Err(ReallocationError::DuplicateCategory {
                    row: row_number,
                    key,
                });
            }

            let budget = row
                .budget
                .parse()
                .filter(|b| *b >= 0.0)
                .ok_or_else(|| ReallocationError::InvalidBudget {
                    row: row_number,
                    category: row.name.clone(),
                    value: row.budget.to_string(),
                })?;

            let keywords = row
                .keywords
                .as_deref()
                .map(split_keywords)
                .unwrap_or_default();

            let family = row
                .family
                .as_deref()
                .map(normalize_text)
                .filter(|f| !f.is_empty());

            index.positions.insert(key.clone(), index.categories.len());
            index.categories.push(Category {
                key,
                name: row.name.trim().to_string(),
                budget,
                keywords,
                family,
            });
        }

        debug!("Built category index with {} categories", index.len());

        Ok(index)
    }

    pub fn get(&self, key: &str) -> Option<&Category> {
        self.positions.get(key).map(|&pos| &self.categories[pos])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    /// Looks up a category by any spelling of its name.
    pub fn find_by_name(&self, name: &str) -> Option<&Category> {
        self.get(&normalize_text(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn total_budget(&self) -> f64 {
        self.categories.iter().map(|c| c.budget).sum()
    }

    /// Category with the largest budget; the first one wins on equal budgets.
    pub fn largest_budget(&self) -> Option<&Category> {
        self.categories
            .iter()
            .fold(None, |best: Option<&Category>, category| match best {
                Some(b) if b.budget >= category.budget => Some(b),
                _ => Some(category),
            })
    }

    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.categories
            .iter()
            .map(|c| CatalogEntry {
                name: c.name.clone(),
                keywords: c.keywords.clone(),
            })
            .collect()
    }
}
