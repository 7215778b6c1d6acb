use crate::allocation::{AllocatedArticle, AssignmentSource};
use crate::categories::{CatalogEntry, CategoryIndex};
use crate::error::Result;
use crate::ingestion::Article;
use crate::normalize::normalize_text;
use log::{debug, trace, warn};
use std::collections::{HashMap, HashSet};

/// Keywords at least this long (in characters) count double.
const LONG_KEYWORD_LEN: usize = 6;

/// Fallback for labels the keyword pass cannot place.
///
/// Receives every unresolved label once, together with the category catalog,
/// and answers in the same order with a category name or `None`.
pub trait BatchClassifier {
    fn classify_batch(
        &self,
        names: &[String],
        catalog: &[CatalogEntry],
    ) -> Result<Vec<Option<String>>>;
}

/// Scores one normalized keyword against normalized article text.
///
/// Zero when absent; otherwise `len * multiplier + (occurrences - 1)` where
/// the multiplier is 2 for keywords of six characters or more.
pub fn keyword_score(text: &str, keyword: &str) -> usize {
    if keyword.is_empty() || !text.contains(keyword) {
        return 0;
    }

    let length = keyword.chars().count();
    let multiplier = if length >= LONG_KEYWORD_LEN { 2 } else { 1 };
    let occurrences = text.matches(keyword).count().max(1);

    length * multiplier + (occurrences - 1)
}

/// Picks the category whose keywords score highest against the article name.
///
/// Ties go to the category met first in index order, i.e. source-row order.
/// That tie-break is kept for compatibility, nothing else depends on it.
pub fn choose_category_by_keywords<'a>(article_name: &str, index: &'a CategoryIndex) -> Option<&'a str> {
    let text = normalize_text(article_name);
    if text.is_empty() {
        return None;
    }

    let mut best: Option<(&str, usize)> = None;

    for category in index.iter().filter(|c| !c.keywords.is_empty()) {
        let score: usize = category
            .keywords
            .iter()
            .map(|k| keyword_score(&text, k))
            .sum();

        trace!("'{}' scores {} for '{}'", text, score, category.key);

        if score > best.map_or(0, |(_, s)| s) {
            best = Some((category.key.as_str(), score));
        }
    }

    best.map(|(key, _)| key)
}

/// Assigns an initial category to every article.
///
/// Keyword matching runs first. Labels it cannot place go to `fallback` in a
/// single batch; whatever is still unresolved lands in the category with the
/// largest budget.
pub fn classify_articles(
    articles: Vec<Article>,
    index: &CategoryIndex,
    fallback: Option<&dyn BatchClassifier>,
) -> Vec<AllocatedArticle> {
    let keyword_hits: Vec<Option<String>> = articles
        .iter()
        .map(|a| choose_category_by_keywords(&a.name, index).map(str::to_string))
        .collect();

    let mut seen = HashSet::new();
    let unresolved: Vec<String> = articles
        .iter()
        .zip(&keyword_hits)
        .filter(|(_, hit)| hit.is_none())
        .map(|(a, _)| a.name.clone())
        .filter(|name| seen.insert(name.clone()))
        .collect();

    let external = match fallback {
        Some(classifier) if !unresolved.is_empty() => {
            resolve_externally(classifier, &unresolved, index)
        }
        _ => HashMap::new(),
    };

    let default_key = index.largest_budget().map(|c| c.key.clone());

    articles
        .into_iter()
        .zip(keyword_hits)
        .map(|(article, hit)| {
            let (category, source) = if let Some(key) = hit {
                (Some(key), AssignmentSource::Keyword)
            } else if let Some(key) = external.get(&article.name) {
                (Some(key.clone()), AssignmentSource::External)
            } else if let Some(key) = &default_key {
                (Some(key.clone()), AssignmentSource::Fallback)
            } else {
                (None, AssignmentSource::Unassigned)
            };

            debug!(
                "Assigned '{}' to {:?} ({:?})",
                article.name, category, source
            );

            AllocatedArticle::new(article, category, source)
        })
        .collect()
}

/// Maps label → category key for the answers that name a known category.
fn resolve_externally(
    classifier: &dyn BatchClassifier,
    names: &[String],
    index: &CategoryIndex,
) -> HashMap<String, String> {
    let answers = match classifier.classify_batch(names, &index.catalog()) {
        Ok(answers) => answers,
        Err(e) => {
            warn!("Batch classifier failed, falling back for {} labels: {}", names.len(), e);
            return HashMap::new();
        }
    };

    if answers.len() != names.len() {
        warn!(
            "Batch classifier returned {} answers for {} labels, ignoring them",
            answers.len(),
            names.len()
        );
        return HashMap::new();
    }

    names
        .iter()
        .zip(answers)
        .filter_map(|(name, answer)| {
            let answer = answer?;
            match index.find_by_name(&answer) {
                Some(category) => Some((name.clone(), category.key.clone())),
                None => {
                    warn!("Batch classifier proposed unknown category '{}' for '{}'", answer, name);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReallocationError;
    use crate::schema::{AmountValue, CategoryRow};
    use std::cell::RefCell;

    fn row(name: &str, budget: f64, keywords: Option<&str>) -> CategoryRow {
        CategoryRow {
            name: name.to_string(),
            budget: AmountValue::from(budget),
            keywords: keywords.map(str::to_string),
            family: None,
        }
    }

    fn sample_index() -> CategoryIndex {
        CategoryIndex::build(&[
            row("Maçonnerie", 1000.0, Some("ciment, parpaing, sable")),
            row("Peinture", 500.0, Some("peinture, enduit, rouleau")),
            row("Divers", 2000.0, None),
        ])
        .unwrap()
    }

    struct ScriptedClassifier {
        answers: HashMap<String, String>,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl ScriptedClassifier {
        fn new(answers: &[(&str, &str)]) -> Self {
            Self {
                answers: answers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl BatchClassifier for ScriptedClassifier {
        fn classify_batch(
            &self,
            names: &[String],
            catalog: &[CatalogEntry],
        ) -> Result<Vec<Option<String>>> {
            assert_eq!(catalog.len(), 3);
            self.calls.borrow_mut().push(names.to_vec());
            Ok(names.iter().map(|n| self.answers.get(n).cloned()).collect())
        }
    }

    struct FailingClassifier;

    impl BatchClassifier for FailingClassifier {
        fn classify_batch(&self, _: &[String], _: &[CatalogEntry]) -> Result<Vec<Option<String>>> {
            Err(ReallocationError::Classifier("timeout".to_string()))
        }
    }

    #[test]
    fn test_keyword_score() {
        assert_eq!(keyword_score("sac de sable", "ciment"), 0);
        // short keyword, single hit
        assert_eq!(keyword_score("sac de sable", "sable"), 5);
        // long keyword doubles
        assert_eq!(keyword_score("ciment gris", "ciment"), 12);
        // repeated hits add one each
        assert_eq!(keyword_score("sable fin et sable gros", "sable"), 6);
        assert_eq!(keyword_score("anything", ""), 0);
    }

    #[test]
    fn test_keyword_score_counts_non_overlapping() {
        assert_eq!(keyword_score("aaaa", "aa"), 2 + 1);
    }

    #[test]
    fn test_choose_category_by_keywords() {
        let index = sample_index();
        assert_eq!(
            choose_category_by_keywords("Sac de CIMENT 35kg", &index),
            Some("maconnerie")
        );
        assert_eq!(
            choose_category_by_keywords("Rouleau + enduit de lissage", &index),
            Some("peinture")
        );
        assert_eq!(choose_category_by_keywords("Location nacelle", &index), None);
        assert_eq!(choose_category_by_keywords("", &index), None);
    }

    #[test]
    fn test_choose_category_picks_highest_total() {
        let index = sample_index();
        // sable (5) < peinture (16)
        assert_eq!(
            choose_category_by_keywords("Peinture effet sable", &index),
            Some("peinture")
        );
    }

    #[test]
    fn test_choose_category_tie_goes_to_first_row() {
        let index = CategoryIndex::build(&[
            row("Première", 10.0, Some("bois")),
            row("Seconde", 10.0, Some("bois")),
        ])
        .unwrap();
        assert_eq!(choose_category_by_keywords("planche de bois", &index), Some("premiere"));
    }

    #[test]
    fn test_choose_category_without_keywords() {
        let index = CategoryIndex::build(&[row("Divers", 10.0, None)]).unwrap();
        assert_eq!(choose_category_by_keywords("ciment", &index), None);
    }

    #[test]
    fn test_classify_articles_sources() {
        let index = sample_index();
        let classifier = ScriptedClassifier::new(&[("Location nacelle", "PEINTURE")]);
        let articles = vec![
            Article::new("Ciment", 100.0),
            Article::new("Location nacelle", 300.0),
            Article::new("Frais de port", 20.0),
            Article::new("Location nacelle", 50.0),
        ];

        let allocated = classify_articles(articles, &index, Some(&classifier));

        assert_eq!(allocated[0].category.as_deref(), Some("maconnerie"));
        assert_eq!(allocated[0].source, AssignmentSource::Keyword);
        assert_eq!(allocated[1].category.as_deref(), Some("peinture"));
        assert_eq!(allocated[1].source, AssignmentSource::External);
        assert_eq!(allocated[2].category.as_deref(), Some("divers"));
        assert_eq!(allocated[2].source, AssignmentSource::Fallback);
        assert_eq!(allocated[3].source, AssignmentSource::External);

        let calls = classifier.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec!["Location nacelle", "Frais de port"]);
    }

    #[test]
    fn test_classify_articles_ignores_unknown_and_failed_answers() {
        let index = sample_index();
        let classifier = ScriptedClassifier::new(&[("Frais de port", "Transport")]);

        let allocated = classify_articles(
            vec![Article::new("Frais de port", 20.0)],
            &index,
            Some(&classifier),
        );
        assert_eq!(allocated[0].category.as_deref(), Some("divers"));
        assert_eq!(allocated[0].source, AssignmentSource::Fallback);

        let allocated = classify_articles(
            vec![Article::new("Frais de port", 20.0)],
            &index,
            Some(&FailingClassifier),
        );
        assert_eq!(allocated[0].source, AssignmentSource::Fallback);
    }

    #[test]
    fn test_classify_articles_empty_index() {
        let allocated = classify_articles(
            vec![Article::new("Ciment", 10.0)],
            &CategoryIndex::default(),
            None,
        );
        assert_eq!(allocated[0].category, None);
        assert_eq!(allocated[0].source, AssignmentSource::Unassigned);
    }
}
