use crate::categories::CategoryIndex;
use crate::ingestion::Article;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    /// Matched on category keyword hints
    Keyword,
    /// Resolved by the pluggable batch classifier
    External,
    /// Neither matched; parked in the largest-budget category
    Fallback,
    /// No category could be chosen (empty index)
    Unassigned,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocatedArticle {
    pub article: Article,
    /// Key of the assigned category. The only field mutated by reallocation.
    pub category: Option<String>,
    pub source: AssignmentSource,
}

impl AllocatedArticle {
    pub fn new(article: Article, category: Option<String>, source: AssignmentSource) -> Self {
        Self {
            article,
            category,
            source,
        }
    }

    pub fn is_in(&self, key: &str) -> bool {
        self.category.as_deref() == Some(key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub totals: BTreeMap<String, f64>,
    /// `budget - total` per category: positive means room left.
    pub gap: BTreeMap<String, f64>,
}

impl Totals {
    pub fn total(&self, key: &str) -> f64 {
        self.totals.get(key).copied().unwrap_or(0.0)
    }

    pub fn gap(&self, key: &str) -> f64 {
        self.gap.get(key).copied().unwrap_or(0.0)
    }
}

/// Sums assigned amounts per category and derives the gap versus budget.
/// Every category gets an entry, including those with no articles.
pub fn compute_totals(articles: &[AllocatedArticle], categories: &CategoryIndex) -> Totals {
    let mut totals: BTreeMap<String, f64> =
        categories.keys().map(|key| (key.to_string(), 0.0)).collect();

    for allocated in articles {
        if let Some(total) = allocated
            .category
            .as_ref()
            .and_then(|key| totals.get_mut(key))
        {
            *total += allocated.article.amount;
        }
    }

    let gap = categories
        .iter()
        .map(|c| (c.key.clone(), c.budget - totals[&c.key]))
        .collect();

    Totals { totals, gap }
}

/// Working state of one run, owned by the rebalancing loop.
#[derive(Debug, Clone, Serialize)]
pub struct Allocation {
    pub articles: Vec<AllocatedArticle>,
    pub categories: CategoryIndex,
    pub totals: BTreeMap<String, f64>,
    pub gap: BTreeMap<String, f64>,
}

impl Allocation {
    pub fn new(articles: Vec<AllocatedArticle>, categories: CategoryIndex) -> Self {
        let mut allocation = Self {
            articles,
            categories,
            totals: BTreeMap::new(),
            gap: BTreeMap::new(),
        };
        allocation.refresh_totals();
        allocation
    }

    /// Recomputes totals and gaps from the current assignment.
    pub fn refresh_totals(&mut self) {
        let Totals { totals, gap } = compute_totals(&self.articles, &self.categories);
        self.totals = totals;
        self.gap = gap;
    }

    pub fn total_amount(&self) -> f64 {
        self.articles.iter().map(|a| a.article.amount).sum()
    }

    pub fn total_allocated(&self) -> f64 {
        self.totals.values().sum()
    }

    /// Indices of the articles currently assigned to `key`.
    pub fn article_indices_in(&self, key: &str) -> Vec<usize> {
        self.articles
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_in(key))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Category keys whose gap is below `-tolerance`, in index order.
    pub fn over_budget_keys(&self, tolerance: f64) -> Vec<String> {
        self.categories
            .keys()
            .filter(|key| self.gap.get(*key).is_some_and(|g| *g < -tolerance))
            .map(str::to_string)
            .collect()
    }

    pub fn max_abs_gap(&self) -> f64 {
        self.gap.values().fold(0.0, |acc, g| acc.max(g.abs()))
    }
}
