mod lists;
mod stopwords;

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::model::{Hit, QueryResult, SearchExpression, TermCount};
use crate::retrieval::Retrieved;
use lists::merge_list_mentions;
use stopwords::is_noise_word;

pub const TOP_TERM_LIMIT: usize = 10;

static TOKEN_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid regex"));

/// Fold raw retrieval output into a `QueryResult`.
///
/// `count` is the total declared by the service, or the number of hits
/// retrieved when that is larger, plus the hits of `list_mentions` that name
/// the gene only in a family list. Hits keep service order with preprints of
/// published articles in the same set removed.
pub fn aggregate(
    retrieved: Retrieved,
    list_mentions: Option<Retrieved>,
    expression: SearchExpression,
    top_terms: bool,
) -> QueryResult {
    // a missing hitCount decodes as 0
    let mut count = retrieved.declared_total.max(retrieved.hits.len() as u64);
    let mut hits = retrieved.hits;

    let mut added = 0;
    if let (Some(extra), Some(family)) = (list_mentions, &expression.family) {
        added = merge_list_mentions(&mut hits, extra.hits, &family.families);
        count += added as u64;
        debug!(query = %expression.query, added, "merged family list mentions");
    }

    let (hits, preprints_removed) = remove_superseded_preprints(hits);
    if preprints_removed > 0 {
        debug!(
            query = %expression.query,
            preprints_removed, "dropped preprints of published articles"
        );
    }

    let top_terms = top_terms.then(|| rank_terms(&hits, &expression.terms, TOP_TERM_LIMIT));

    QueryResult {
        count,
        hits,
        truncated: retrieved.truncated,
        preprints_removed,
        list_mentions: added,
        top_terms,
        expression,
    }
}

fn remove_superseded_preprints(hits: Vec<Hit>) -> (Vec<Hit>, usize) {
    let ids: HashSet<String> = hits.iter().map(|h| h.id.clone()).collect();
    let before = hits.len();
    let kept: Vec<Hit> = hits
        .into_iter()
        .filter(|h| !h.preprint_of.as_ref().is_some_and(|id| ids.contains(id)))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Most frequent words across the titles and abstracts of `hits`, excluding the search
/// terms themselves, stop words and numbers.
///
/// Words are counted case-insensitively and reported in the form first seen.
/// Ties keep first-occurrence order.
pub fn rank_terms(hits: &[Hit], search_terms: &[String], limit: usize) -> Vec<TermCount> {
    let exclusions = Exclusions::new(search_terms);

    // lowercase word -> (display form, count, first index)
    let mut counts: HashMap<String, (String, usize, usize)> = HashMap::new();
    let mut position = 0;
    let texts = hits
        .iter()
        .flat_map(|h| [h.title.as_deref(), h.abstract_text.as_deref()])
        .flatten();
    for text in texts {
        let tokens = tokenize(text);
        let lower: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
        let mut i = 0;
        while i < tokens.len() {
            if let Some(len) = exclusions.phrase_at(&lower[i..]) {
                i += len;
                continue;
            }
            let (token, key) = (tokens[i], &lower[i]);
            i += 1;
            if token.chars().count() < 2 || token.chars().all(|c| c.is_numeric()) {
                continue;
            }
            if is_noise_word(key) || exclusions.words.contains(key) {
                continue;
            }
            position += 1;
            counts
                .entry(key.clone())
                .or_insert_with(|| (token.to_string(), 0, position))
                .1 += 1;
        }
    }

    let mut ranked: Vec<(String, usize, usize)> = counts.into_values().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(term, count, _)| TermCount { term, count })
        .collect()
}

fn tokenize(text: &str) -> Vec<&str> {
    TOKEN_SPLIT.split(text).filter(|t| !t.is_empty()).collect()
}

/// Search terms split the same way as hit text. One-token terms are excluded
/// word by word; longer terms only as a whole token sequence, so `HLA-B` and
/// `normal diet` never leave fragments behind.
struct Exclusions {
    words: HashSet<String>,
    phrases: Vec<Vec<String>>,
}

impl Exclusions {
    fn new(search_terms: &[String]) -> Self {
        let mut words = HashSet::new();
        let mut phrases = Vec::new();
        for term in search_terms {
            let mut tokens: Vec<String> = tokenize(term).iter().map(|t| t.to_lowercase()).collect();
            match tokens.len() {
                0 => {}
                1 => {
                    words.extend(tokens.pop());
                }
                _ => phrases.push(tokens),
            }
        }
        Self { words, phrases }
    }

    /// Length of the longest excluded phrase starting the slice.
    fn phrase_at(&self, tokens: &[String]) -> Option<usize> {
        self.phrases
            .iter()
            .filter(|p| tokens.starts_with(p.as_slice()))
            .map(Vec::len)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_abstract(id: &str, text: &str) -> Hit {
        Hit {
            abstract_text: Some(text.to_string()),
            ..Hit::stub(id)
        }
    }

    fn expression(terms: &[&str]) -> SearchExpression {
        SearchExpression {
            query: "q".into(),
            taxon: 9606,
            keywords: Vec::new(),
            terms: terms.iter().map(|s| s.to_string()).collect(),
            family: None,
        }
    }

    #[test]
    fn preprint_of_present_article_is_removed() {
        let published = Hit::stub("34567");
        let preprint = Hit {
            source: "PPR".into(),
            preprint_of: Some("34567".into()),
            ..Hit::stub("PPR1")
        };
        let orphan = Hit {
            source: "PPR".into(),
            preprint_of: Some("99999".into()),
            ..Hit::stub("PPR2")
        };
        let retrieved = Retrieved {
            declared_total: 3,
            hits: vec![preprint, published, orphan],
            pages: 1,
            truncated: false,
        };

        let result = aggregate(retrieved, None, expression(&[]), false);
        let ids: Vec<&str> = result.hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["34567", "PPR2"]);
        assert_eq!(result.preprints_removed, 1);
        assert_eq!(result.count, 3);
        assert!(result.top_terms.is_none());
    }

    #[test]
    fn zero_hits_is_a_valid_result() {
        let result = aggregate(Retrieved::default(), None, expression(&["CFTR"]), true);
        assert_eq!(result.count, 0);
        assert!(result.hits.is_empty());
        assert_eq!(result.top_terms, Some(vec![]));
    }

    #[test]
    fn top_terms_exclude_search_terms_and_noise() {
        let hits = vec![
            with_abstract(
                "1",
                "CFTR modulators improve lung function in cystic fibrosis patients.",
            ),
            with_abstract(
                "2",
                "Lung inflammation and cftr: the cystic-fibrosis airway in 2020.",
            ),
        ];
        let terms = ["CFTR", "cystic fibrosis"].map(String::from);
        let ranked = rank_terms(&hits, &terms, 3);

        assert_eq!(ranked[0], TermCount { term: "lung".into(), count: 2 });
        let words: Vec<&str> = ranked.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(words, ["lung", "modulators", "improve"]);
    }

    #[test]
    fn top_terms_respect_limit_and_skip_missing_abstracts() {
        let hits = vec![
            Hit::stub("1"),
            with_abstract("2", "alpha beta gamma delta epsilon"),
        ];
        let ranked = rank_terms(&hits, &[], 2);
        let words: Vec<&str> = ranked.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(words, ["alpha", "beta"]);
    }

    #[test]
    fn titles_count_towards_top_terms() {
        let hits = vec![Hit {
            title: Some("Sweat chloride".into()),
            ..with_abstract("1", "chloride transport")
        }];
        let ranked = rank_terms(&hits, &[], 10);
        assert_eq!(ranked[0], TermCount { term: "chloride".into(), count: 2 });
        assert_eq!(ranked[1].term, "Sweat");
    }

    #[test]
    fn missing_declared_total_falls_back_to_retrieved_hits() {
        let retrieved = Retrieved {
            declared_total: 0,
            hits: vec![Hit::stub("1"), Hit::stub("2")],
            pages: 1,
            truncated: false,
        };
        assert_eq!(aggregate(retrieved, None, expression(&[]), false).count, 2);
    }

    #[test]
    fn punctuated_search_terms_leave_no_fragments() {
        let hits = vec![
            with_abstract("1", "HLA-B alleles and COVID-19 severity; COVID-19 in HLA-B carriers."),
            with_abstract("2", "COVID-19 outcomes by HLA-B type and dJ760C5.1 expression, covid-19 cohort."),
        ];
        let terms = ["HLA-B", "COVID-19", "dJ760C5.1"].map(String::from);
        let words: Vec<String> = rank_terms(&hits, &terms, 10)
            .into_iter()
            .map(|t| t.term.to_lowercase())
            .collect();
        for fragment in ["hla", "covid", "dj760c5"] {
            assert!(!words.contains(&fragment.to_string()), "{fragment} in {words:?}");
        }
        assert!(words.contains(&"alleles".to_string()));
    }

    #[test]
    fn phrases_only_match_whole_words() {
        let hits = vec![with_abstract(
            "1",
            "abnormal dietary habits; abnormal dietary intake; a normal diet helps",
        )];
        let terms = ["normal diet".to_string()];
        let words: Vec<String> = rank_terms(&hits, &terms, 10)
            .into_iter()
            .map(|t| t.term)
            .collect();
        assert_eq!(words[..2], ["abnormal", "dietary"]);
        assert!(!words.iter().any(|w| w == "ab" || w == "ary" || w == "normal" || w == "diet"));
    }

    #[test]
    fn family_list_mentions_extend_hits_and_count() {
        use crate::model::{FamilySearch, GeneFamily};

        let expression = SearchExpression {
            family: Some(FamilySearch {
                query: "(TITLE:ADAMTS* OR ABSTRACT:ADAMTS*)".into(),
                families: vec![GeneFamily {
                    root: "ADAMTS".into(),
                    members: vec!["5".into()],
                }],
            }),
            ..expression(&["ADAMTS5"])
        };
        let main = Retrieved {
            declared_total: 40,
            hits: vec![with_abstract("1", "ADAMTS5 knockout mice")],
            pages: 1,
            truncated: true,
        };
        let family = Retrieved {
            declared_total: 300,
            hits: vec![
                with_abstract("1", "ADAMTS5 knockout mice"),
                with_abstract("2", "ADAMTS4 and 5 degrade aggrecan"),
                with_abstract("3", "ADAMTS13 deficiency"),
            ],
            pages: 1,
            truncated: true,
        };

        let result = aggregate(main, Some(family), expression, false);
        let ids: Vec<&str> = result.hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
        assert_eq!(result.count, 41);
        assert_eq!(result.list_mentions, 1);
        assert!(result.truncated);
    }

    #[test]
    fn list_mentions_ignored_without_family() {
        let family = Retrieved {
            hits: vec![with_abstract("2", "ADAMTS4 and 5 degrade aggrecan")],
            ..Retrieved::default()
        };
        let result = aggregate(Retrieved::default(), Some(family), expression(&[]), false);
        assert!(result.hits.is_empty());
        assert_eq!(result.list_mentions, 0);
    }
}
