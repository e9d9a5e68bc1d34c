//! Data model shared by the resolver, builder, dispatcher and aggregator.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// NCBI taxonomy ID for *Homo sapiens*.
pub const HUMAN_TAXON: u32 = 9606;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    /// Gene symbol (HGNC or organism equivalent)
    #[default]
    Gene,
    /// UniProt accession
    Accession,
}

impl IdType {
    /// UniProt query field used to look the identifier up.
    pub fn uniprot_field(self) -> &'static str {
        match self {
            IdType::Gene => "gene_exact",
            IdType::Accession => "accession",
        }
    }
}

/// Semantic category of a term, which decides the lookup service used to expand it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Gene(IdType),
    Disease,
    Tissue,
    Keyword,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Gene(IdType::Gene) => f.write_str("gene"),
            Category::Gene(IdType::Accession) => f.write_str("accession"),
            Category::Disease => f.write_str("disease"),
            Category::Tissue => f.write_str("tissue"),
            Category::Keyword => f.write_str("keyword"),
        }
    }
}

fn default_taxon() -> u32 {
    HUMAN_TAXON
}

/// One input row: a gene plus the optional concepts it must co-occur with.
///
/// Each entry of `keyword_groups` is an alternative search; all keywords inside
/// one group must co-occur.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchUnit {
    pub gene: String,
    #[serde(default)]
    pub id_type: IdType,
    #[serde(default = "default_taxon")]
    pub taxon: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disease: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tissue: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyword_groups: Vec<Vec<String>>,
}

impl SearchUnit {
    pub fn new(gene: impl Into<String>) -> Self {
        Self {
            gene: gene.into(),
            id_type: IdType::Gene,
            taxon: HUMAN_TAXON,
            disease: None,
            tissue: None,
            keyword_groups: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_disease(mut self, disease: impl Into<String>) -> Self {
        self.disease = Some(disease.into());
        self
    }

    #[cfg(test)]
    pub(crate) fn with_tissue(mut self, tissue: impl Into<String>) -> Self {
        self.tissue = Some(tissue.into());
        self
    }

    #[cfg(test)]
    pub(crate) fn with_keyword_group<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keyword_groups
            .push(group.into_iter().map(Into::into).collect());
        self
    }

    /// Comma-joined description of the non-gene search terms, for report headings.
    pub fn search_terms(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        parts.extend(self.disease.iter().cloned());
        parts.extend(self.tissue.iter().cloned());
        for group in &self.keyword_groups {
            parts.push(group.join(" + "));
        }
        parts.join(", ")
    }
}

/// Split a keyword cell such as `"normal diet, biomarker"` into one keyword group.
///
/// Keywords are trimmed and de-duplicated case-insensitively; order is kept.
pub fn parse_keyword_group(cell: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    cell.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty() && seen.insert(k.to_lowercase()))
        .map(String::from)
        .collect()
}

/// The literal term plus every alternate name considered equivalent when searching.
///
/// The first entry is always the literal term; the alternates follow in
/// case-insensitive alphabetical order so that query text is reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynonymSet {
    terms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback: Option<String>,
}

impl SynonymSet {
    pub fn new(canonical: &str, alternates: impl IntoIterator<Item = String>) -> Self {
        let canonical = canonical.trim().to_string();
        let mut seen = HashSet::from([canonical.to_lowercase()]);
        let mut rest: Vec<String> = alternates
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
            .collect();
        rest.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));

        let mut terms = Vec::with_capacity(rest.len() + 1);
        terms.push(canonical);
        terms.extend(rest);
        Self {
            terms,
            fallback: None,
        }
    }

    pub fn literal(term: &str) -> Self {
        Self::new(term, Vec::new())
    }

    /// Literal-only set recording why expansion was not possible.
    pub fn degraded(term: &str, reason: impl Into<String>) -> Self {
        Self {
            fallback: Some(reason.into()),
            ..Self::literal(term)
        }
    }

    pub fn canonical(&self) -> &str {
        &self.terms[0]
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn contains_ignore_case(&self, term: &str) -> bool {
        self.terms.iter().any(|t| t.eq_ignore_ascii_case(term))
    }
}

/// One boolean query ready to submit to the literature service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchExpression {
    pub query: String,
    pub taxon: u32,
    /// The keyword group this expression requires, empty for the keyword-free search.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Every literal search term used to build `query`.
    #[serde(skip)]
    pub terms: Vec<String>,
    /// Companion search for papers naming the gene only in a family list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<FamilySearch>,
}

/// A numbered gene family root and the member numbers that name the searched
/// gene, e.g. `ADAMTS` with `5`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneFamily {
    pub root: String,
    pub members: Vec<String>,
}

/// Wildcard search on the family roots, filtered afterwards to hits that list
/// one of the members (`ADAMTS4 and 5`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilySearch {
    pub query: String,
    pub families: Vec<GeneFamily>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub id: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pub_types: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// ID of the published article this record is a preprint of.
    #[serde(skip)]
    pub preprint_of: Option<String>,
}

impl Hit {
    pub fn url(&self) -> String {
        format!("https://europepmc.org/abstract/{}/{}", self.source, self.id)
    }

    #[cfg(test)]
    pub(crate) fn stub(id: &str) -> Self {
        Self {
            id: id.to_string(),
            source: "MED".to_string(),
            title: None,
            abstract_text: None,
            authors: None,
            journal: None,
            pub_year: None,
            doi: None,
            pub_types: Vec::new(),
            keywords: Vec::new(),
            preprint_of: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

/// Aggregated outcome of one `SearchExpression`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub expression: SearchExpression,
    pub count: u64,
    pub hits: Vec<Hit>,
    /// True when fewer hits were retrieved than the service reported.
    pub truncated: bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub preprints_removed: usize,
    /// Hits found only through a family list mention, included in `count`.
    #[serde(skip_serializing_if = "is_zero")]
    pub list_mentions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_terms: Option<Vec<TermCount>>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}
