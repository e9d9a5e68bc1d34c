//! Recognises papers that name a gene only inside a family list, such as
//! `ADAMTS4 and 5` or `ADAMTS-1, -4, and -5`.

use std::collections::HashSet;

use regex::Regex;

use crate::model::{GeneFamily, Hit};

const SEP: &str = r"[\s\-\x{2010}-\x{2014}]*";
const NUMBER: &str = r"\d+[a-z]?\d*";

pub(crate) struct ListMatcher {
    patterns: Vec<Regex>,
}

impl ListMatcher {
    pub(crate) fn new(families: &[GeneFamily]) -> Self {
        let patterns = families
            .iter()
            .flat_map(|family| {
                let root = regex::escape(&family.root.to_lowercase());
                family.members.iter().map(move |member| {
                    let member = regex::escape(&member.to_lowercase());
                    format!(
                        r"(?:^|[^a-z0-9]){root}'?{SEP}{NUMBER}(?:{SEP},{SEP}{NUMBER})*{SEP},?{SEP}(?:and|or|,)\s{SEP}{member}(?:$|[^a-z0-9])"
                    )
                })
            })
            .filter_map(|pattern| Regex::new(&pattern).ok())
            .collect();
        Self { patterns }
    }

    pub(crate) fn matches(&self, hit: &Hit) -> bool {
        let text = format!(
            "{}. {}",
            hit.title.as_deref().unwrap_or_default(),
            hit.abstract_text.as_deref().unwrap_or_default()
        )
        .to_lowercase();
        self.patterns.iter().any(|p| p.is_match(&text))
    }
}

/// Append the `candidates` that mention a family member in a list and are not
/// already in `hits`. Returns how many were added.
pub(crate) fn merge_list_mentions(
    hits: &mut Vec<Hit>,
    candidates: Vec<Hit>,
    families: &[GeneFamily],
) -> usize {
    let matcher = ListMatcher::new(families);
    let mut seen: HashSet<String> = hits.iter().map(|h| h.id.clone()).collect();
    let before = hits.len();
    hits.extend(
        candidates
            .into_iter()
            .filter(|h| matcher.matches(h) && seen.insert(h.id.clone())),
    );
    hits.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adamts() -> Vec<GeneFamily> {
        vec![GeneFamily {
            root: "ADAMTS".into(),
            members: vec!["5".into(), "11".into()],
        }]
    }

    fn hit(id: &str, abstract_text: &str) -> Hit {
        Hit {
            abstract_text: Some(abstract_text.into()),
            ..Hit::stub(id)
        }
    }

    #[test]
    fn recognises_list_forms() {
        let matcher = ListMatcher::new(&adamts());
        for text in [
            "Expression of ADAMTS4 and 5 was raised.",
            "ADAMTS-1, -4, and -5 cleave aggrecan",
            "aggrecanases (ADAMTS 4 or 5)",
            "ADAMTS4, 9 and 11 were measured",
        ] {
            assert!(matcher.matches(&hit("1", text)), "{text}");
        }
    }

    #[test]
    fn other_members_and_bare_numbers_do_not_match() {
        let matcher = ListMatcher::new(&adamts());
        for text in [
            "ADAMTS4 and 50 patients",
            "ADAMTS4 and 1",
            "ADAMTS4 levels and 5 controls",
            "NADAMTS4 and 5",
        ] {
            assert!(!matcher.matches(&hit("1", text)), "{text}");
        }
    }

    #[test]
    fn merge_adds_only_new_matching_hits() {
        let mut hits = vec![hit("A", "ADAMTS5 in cartilage")];
        let candidates = vec![
            hit("A", "ADAMTS4 and 5 in cartilage"),
            hit("B", "ADAMTS4 and 5 in cartilage"),
            hit("C", "ADAMTS4 only"),
        ];
        let added = merge_list_mentions(&mut hits, candidates, &adamts());
        assert_eq!(added, 1);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["A", "B"]);
    }
}
