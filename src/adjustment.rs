use crate::allocation::Allocation;
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

/// Budget/spend mismatch (same unit as amounts) above which budgets are
/// rescaled for reporting.
pub const GLOBAL_ADJUSTMENT_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetAdjustment {
    pub total_budget: f64,
    pub total_allocated: f64,
    /// `total_budget - total_allocated`
    pub difference: f64,
    pub applied: bool,
    /// Adjusted budget per category key, every category present.
    pub adjusted_budgets: BTreeMap<String, f64>,
    /// Keys that absorbed a non-zero share of the difference.
    pub adjusted_keys: Vec<String>,
}

impl BudgetAdjustment {
    pub fn adjusted_budget(&self, key: &str) -> Option<f64> {
        self.adjusted_budgets.get(key).copied()
    }
}

/// Reporting-only view in which budgets sum to the allocated amount.
///
/// When total budget and total spend differ by more than
/// [`GLOBAL_ADJUSTMENT_THRESHOLD`], the difference is taken out of the
/// under-budget categories (or all of them when none has room) in proportion
/// to their headroom, using the budget as weight where headroom is not
/// positive. The allocation itself is left untouched.
pub fn compute_adjusted_budgets(allocation: &Allocation, tolerance: f64) -> BudgetAdjustment {
    let total_budget = allocation.categories.total_budget();
    let total_allocated = allocation.total_allocated();
    let difference = total_budget - total_allocated;

    let mut adjusted_budgets: BTreeMap<String, f64> = allocation
        .categories
        .iter()
        .map(|c| (c.key.clone(), c.budget))
        .collect();

    if difference.abs() <= GLOBAL_ADJUSTMENT_THRESHOLD || allocation.categories.is_empty() {
        return BudgetAdjustment {
            total_budget,
            total_allocated,
            difference,
            applied: false,
            adjusted_budgets,
            adjusted_keys: Vec::new(),
        };
    }

    let gap_of = |key: &str| allocation.gap.get(key).copied().unwrap_or(0.0);

    let under_budget: Vec<_> = allocation
        .categories
        .iter()
        .filter(|c| gap_of(c.key.as_str()) > tolerance)
        .collect();

    let pool = if under_budget.is_empty() {
        allocation.categories.iter().collect()
    } else {
        under_budget
    };

    let weights: Vec<f64> = pool
        .iter()
        .map(|c| {
            let headroom = gap_of(c.key.as_str());
            if headroom > 0.0 {
                headroom
            } else {
                c.budget
            }
        })
        .collect();
    let total_weight: f64 = weights.iter().sum();

    let mut adjusted_keys = Vec::new();

    for (category, weight) in pool.iter().zip(&weights) {
        let relative_weight = if total_weight == 0.0 {
            1.0 / pool.len() as f64
        } else {
            weight / total_weight
        };

        let share = difference * relative_weight;
        if share != 0.0 {
            adjusted_budgets.insert(category.key.clone(), category.budget - share);
            adjusted_keys.push(category.key.clone());
        }
    }

    debug!(
        "Spread {:.2} of budget difference over {} categories",
        difference,
        adjusted_keys.len()
    );

    BudgetAdjustment {
        total_budget,
        total_allocated,
        difference,
        applied: true,
        adjusted_budgets,
        adjusted_keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{AllocatedArticle, AssignmentSource};
    use crate::categories::CategoryIndex;
    use crate::ingestion::Article;
    use crate::schema::{AmountValue, CategoryRow};

    fn allocation(budgets: &[(&str, f64)], spend: &[(&str, f64)]) -> Allocation {
        let rows: Vec<CategoryRow> = budgets
            .iter()
            .map(|(name, budget)| CategoryRow {
                name: name.to_string(),
                budget: AmountValue::from(*budget),
                keywords: None,
                family: None,
            })
            .collect();
        let articles = spend
            .iter()
            .map(|(key, amount)| {
                AllocatedArticle::new(
                    Article::new(format!("{} line", key), *amount),
                    Some(key.to_string()),
                    AssignmentSource::Keyword,
                )
            })
            .collect();
        Allocation::new(articles, CategoryIndex::build(&rows).unwrap())
    }

    fn sum(adjustment: &BudgetAdjustment) -> f64 {
        adjustment.adjusted_budgets.values().sum()
    }

    #[test]
    fn test_within_threshold_keeps_nominal() {
        let alloc = allocation(&[("A", 100.0), ("B", 100.0)], &[("a", 95.0), ("b", 100.0)]);
        let adjustment = compute_adjusted_budgets(&alloc, 10.0);

        assert!(!adjustment.applied);
        assert!((adjustment.difference - 5.0).abs() < 1e-9);
        assert_eq!(adjustment.adjusted_budget("a"), Some(100.0));
        assert!(adjustment.adjusted_keys.is_empty());
    }

    #[test]
    fn test_surplus_taken_from_headroom() {
        // gaps: a 0, b 100, c 300 → difference 400 spread 1:3 over b and c
        let alloc = allocation(
            &[("A", 100.0), ("B", 200.0), ("C", 300.0)],
            &[("a", 100.0), ("b", 100.0)],
        );
        let adjustment = compute_adjusted_budgets(&alloc, 10.0);

        assert!(adjustment.applied);
        assert_eq!(adjustment.adjusted_budget("a"), Some(100.0));
        assert!((adjustment.adjusted_budget("b").unwrap() - 100.0).abs() < 1e-9);
        assert!((adjustment.adjusted_budget("c").unwrap() - 0.0).abs() < 1e-9);
        assert_eq!(adjustment.adjusted_keys, vec!["b".to_string(), "c".to_string()]);
        assert!((sum(&adjustment) - alloc.total_allocated()).abs() < 1e-9);

        // allocation untouched
        assert!((alloc.categories.get("c").unwrap().budget - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_overspend_spread_by_budget_when_no_headroom() {
        // everything over budget: weights fall back to budgets 100:300
        let alloc = allocation(&[("A", 100.0), ("B", 300.0)], &[("a", 200.0), ("b", 400.0)]);
        let adjustment = compute_adjusted_budgets(&alloc, 10.0);

        assert!(adjustment.applied);
        assert!((adjustment.difference + 200.0).abs() < 1e-9);
        assert!((adjustment.adjusted_budget("a").unwrap() - 150.0).abs() < 1e-9);
        assert!((adjustment.adjusted_budget("b").unwrap() - 450.0).abs() < 1e-9);
        assert!((sum(&adjustment) - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weights_split_evenly() {
        let alloc = allocation(&[("A", 0.0), ("B", 0.0)], &[("a", 30.0), ("b", 10.0)]);
        let adjustment = compute_adjusted_budgets(&alloc, 5.0);

        assert!(adjustment.applied);
        assert!((adjustment.adjusted_budget("a").unwrap() - 20.0).abs() < 1e-9);
        assert!((adjustment.adjusted_budget("b").unwrap() - 20.0).abs() < 1e-9);
    }
}
