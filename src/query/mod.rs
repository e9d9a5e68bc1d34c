pub mod advanced;

pub use advanced::{AdvancedSearch, YearRange};

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{FamilySearch, GeneFamily, SearchExpression, SearchUnit, SynonymSet};
use crate::synonyms::clean::gene_families;

/// Fields every term is matched against.
const SEARCH_FIELDS: &[&str] = &["TITLE", "ABSTRACT", "KW"];

/// Family roots are only matched in running text, where member lists occur.
const FAMILY_FIELDS: &[&str] = &["TITLE", "ABSTRACT"];

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid year range: '{0}'. Use formats like '2010-2020', '2015-', '-2005' or '2019'.")]
    InvalidYearRange(String),

    #[error("Invalid search field: '{0}'. Field names are upper-case letters and underscores.")]
    InvalidField(String),

    #[error("Unbalanced quotes or parentheses in raw query: {0}")]
    Unbalanced(String),
}

/// Synonym sets resolved for every concept of one `SearchUnit`.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSynonyms {
    pub gene: SynonymSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disease: Option<SynonymSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tissue: Option<SynonymSet>,
    /// Keyed by the keyword as written in the unit. Missing keywords are
    /// searched literally.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub keywords: BTreeMap<String, SynonymSet>,
}

impl ResolvedSynonyms {
    /// Every concept searched as written.
    pub fn literal(unit: &SearchUnit) -> Self {
        Self {
            gene: SynonymSet::literal(&unit.gene),
            disease: unit.disease.as_deref().map(SynonymSet::literal),
            tissue: unit.tissue.as_deref().map(SynonymSet::literal),
            keywords: BTreeMap::new(),
        }
    }
}

/// Turns a `SearchUnit` and its synonyms into boolean query expressions.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    advanced: Option<String>,
}

impl QueryBuilder {
    pub fn new(advanced: &AdvancedSearch) -> Result<Self, QueryError> {
        advanced.validate()?;
        Ok(Self {
            advanced: advanced.to_clause(),
        })
    }

    /// One expression per keyword group, or a single expression when the unit
    /// has no keywords. Output depends only on the inputs.
    ///
    /// When the gene's names belong to a numbered family, every expression
    /// also carries a family search with the gene replaced by its roots.
    pub fn build(&self, unit: &SearchUnit, synonyms: &ResolvedSynonyms) -> Vec<SearchExpression> {
        let families = gene_families(synonyms.gene.terms());
        let mut base: Vec<&SynonymSet> = Vec::new();
        base.extend(synonyms.disease.as_ref());
        base.extend(synonyms.tissue.as_ref());

        if unit.keyword_groups.is_empty() {
            return vec![self.expression(unit, &synonyms.gene, &families, &base, Vec::new())];
        }

        unit.keyword_groups
            .iter()
            .map(|group| {
                let keyword_sets: Vec<SynonymSet> = group
                    .iter()
                    .map(|k| {
                        synonyms
                            .keywords
                            .get(k)
                            .cloned()
                            .unwrap_or_else(|| SynonymSet::literal(k))
                    })
                    .collect();
                let mut others = base.clone();
                others.extend(keyword_sets.iter());
                self.expression(unit, &synonyms.gene, &families, &others, group.clone())
            })
            .collect()
    }

    fn expression(
        &self,
        unit: &SearchUnit,
        gene: &SynonymSet,
        families: &[GeneFamily],
        others: &[&SynonymSet],
        keywords: Vec<String>,
    ) -> SearchExpression {
        let mut terms = Vec::new();
        let gene_clause = concept_clause(gene, &mut terms);
        let other_clauses: Vec<String> = others
            .iter()
            .filter_map(|set| concept_clause(set, &mut terms))
            .collect();

        let join = |first: Option<String>| {
            first
                .into_iter()
                .chain(other_clauses.iter().cloned())
                .chain(self.advanced.clone())
                .collect::<Vec<_>>()
                .join(" AND ")
        };
        let family = (!families.is_empty()).then(|| FamilySearch {
            query: join(Some(root_group(families))),
            families: families.to_vec(),
        });

        SearchExpression {
            query: join(gene_clause),
            taxon: unit.taxon,
            keywords,
            terms,
            family,
        }
    }
}

/// OR group for one concept, recording its terms.
fn concept_clause(set: &SynonymSet, terms: &mut Vec<String>) -> Option<String> {
    let group = or_group(set.terms())?;
    terms.extend(
        set.terms()
            .iter()
            .map(|t| strip_quotes(t))
            .filter(|t| !t.is_empty()),
    );
    Some(group)
}

/// `(TITLE:ADAMTS* OR ABSTRACT:ADAMTS*)` over every family root.
fn root_group(families: &[GeneFamily]) -> String {
    let clauses: Vec<String> = families
        .iter()
        .flat_map(|f| FAMILY_FIELDS.iter().map(move |field| format!("{field}:{}*", f.root)))
        .collect();
    format!("({})", clauses.join(" OR "))
}

fn strip_quotes(term: &str) -> String {
    term.replace('"', "").trim().to_string()
}

/// `TITLE:"t" OR ABSTRACT:"t" OR KW:"t"`
pub fn field_clause(term: &str) -> String {
    SEARCH_FIELDS
        .iter()
        .map(|field| format!("{field}:\"{term}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Parenthesised OR of every term; `None` if no term survives quote stripping.
pub fn or_group(terms: &[String]) -> Option<String> {
    let clauses: Vec<String> = terms
        .iter()
        .map(|t| strip_quotes(t))
        .filter(|t| !t.is_empty())
        .map(|t| field_clause(&t))
        .collect();
    if clauses.is_empty() {
        None
    } else {
        Some(format!("({})", clauses.join(" OR ")))
    }
}
