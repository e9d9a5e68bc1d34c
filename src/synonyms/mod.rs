pub(crate) mod clean;
mod ols;
mod uniprot;

pub use ols::{OlsClient, OntologyScope};
pub use uniprot::UniprotClient;

pub const UNIPROT_API_BASE: &str = uniprot::API_BASE;
pub const OLS_API_BASE: &str = ols::API_BASE;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::model::{Category, HUMAN_TAXON, IdType, SynonymSet};
use clean::{clean_synonyms, term_variants};

/// Keyword expansions larger than this are ontology noise, not synonyms.
const MAX_KEYWORD_SYNONYMS: usize = 100;

/// Errors returned by the identifier-mapping and ontology services.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("lookup service rate limit exceeded")]
    RateLimited,

    #[error("lookup API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("no matching entry")]
    NotFound,

    #[error("lookup timed out after {0} ms")]
    Timeout(u64),
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LookupError> {
    let status = response.status();
    match status.as_u16() {
        200..=299 => Ok(response),
        429 => Err(LookupError::RateLimited),
        code => {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| format!("HTTP {status}"));
            Err(LookupError::Api {
                code,
                message: text.chars().take(200).collect(),
            })
        }
    }
}

/// Abstraction over the external name services.
/// Implemented by `HttpLookup` for production; mock implementations used in tests.
pub trait SynonymLookup {
    async fn gene_names(
        &self,
        id: &str,
        id_type: IdType,
        taxon: u32,
    ) -> Result<Vec<String>, LookupError>;

    async fn ontology_synonyms(
        &self,
        term: &str,
        scope: OntologyScope,
    ) -> Result<Vec<String>, LookupError>;
}

/// UniProt and the OGG gene ontology for genes, OLS for everything else.
pub struct HttpLookup {
    uniprot: UniprotClient,
    ols: OlsClient,
}

impl HttpLookup {
    pub fn new(uniprot: UniprotClient, ols: OlsClient) -> Self {
        Self { uniprot, ols }
    }
}

impl SynonymLookup for HttpLookup {
    async fn gene_names(
        &self,
        id: &str,
        id_type: IdType,
        taxon: u32,
    ) -> Result<Vec<String>, LookupError> {
        let uniprot = self.uniprot.gene_names(id, id_type, taxon);
        // OGG is searched by symbol, so accessions only go to UniProt
        let ogg = async {
            match id_type {
                IdType::Gene => {
                    let scope = OntologyScope::Gene {
                        human_only: taxon == HUMAN_TAXON,
                    };
                    Some(self.ols.best_match_synonyms(id, scope).await)
                }
                IdType::Accession => None,
            }
        };
        let (uniprot, ogg) = tokio::join!(uniprot, ogg);
        merge_gene_sources(uniprot, ogg)
    }

    async fn ontology_synonyms(
        &self,
        term: &str,
        scope: OntologyScope,
    ) -> Result<Vec<String>, LookupError> {
        self.ols.best_match_synonyms(term, scope).await
    }
}

/// UniProt names followed by OGG names. Either source alone is enough; the
/// UniProt error is reported when neither answers.
fn merge_gene_sources(
    uniprot: Result<Vec<String>, LookupError>,
    ogg: Option<Result<Vec<String>, LookupError>>,
) -> Result<Vec<String>, LookupError> {
    match (uniprot, ogg) {
        (Ok(mut names), Some(Ok(more))) => {
            names.extend(more);
            Ok(names)
        }
        (Ok(names), Some(Err(e))) => {
            debug!(error = %e, "ogg gene lookup failed, using uniprot names only");
            Ok(names)
        }
        (Ok(names), None) => Ok(names),
        (Err(_), Some(Ok(names))) => Ok(names),
        (Err(e), _) => Err(e),
    }
}

/// Ontology lookups are organism independent, so only genes carry the taxon.
type CacheKey = (String, Category, Option<u32>);

/// Expands terms into `SynonymSet`s, memoizing each (term, category, taxon) for
/// the lifetime of the resolver.
///
/// Concurrent requests for the same key share one in-flight lookup. Lookup
/// failures never surface as errors: the term degrades to its literal form and
/// the reason is recorded on the set.
pub struct SynonymResolver<L> {
    lookup: L,
    timeout: Duration,
    cache: Mutex<HashMap<CacheKey, Arc<OnceCell<SynonymSet>>>>,
}

impl<L: SynonymLookup> SynonymResolver<L> {
    pub fn new(lookup: L, timeout: Duration) -> Self {
        Self {
            lookup,
            timeout,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, term: &str, category: Category, taxon: u32) -> SynonymSet {
        let term = term.trim();
        let key = (
            term.to_string(),
            category,
            matches!(category, Category::Gene(_)).then_some(taxon),
        );
        let cell = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cache.entry(key).or_default())
        };
        cell.get_or_init(|| self.fetch(term, category, taxon))
            .await
            .clone()
    }

    /// Number of distinct keys looked up so far.
    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn fetch(&self, term: &str, category: Category, taxon: u32) -> SynonymSet {
        let lookup = async {
            match category {
                Category::Gene(id_type) => self.lookup.gene_names(term, id_type, taxon).await,
                Category::Disease => {
                    self.lookup
                        .ontology_synonyms(term, OntologyScope::Disease)
                        .await
                }
                Category::Tissue => {
                    self.lookup
                        .ontology_synonyms(term, OntologyScope::Tissue)
                        .await
                }
                Category::Keyword => self.lookup.ontology_synonyms(term, OntologyScope::Any).await,
            }
        };

        let raw = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(names)) if !names.is_empty() => names,
            Ok(Ok(_)) => return degrade(term, category, &LookupError::NotFound),
            Ok(Err(e)) => return degrade(term, category, &e),
            Err(_) => {
                let e = LookupError::Timeout(self.timeout.as_millis() as u64);
                return degrade(term, category, &e);
            }
        };

        let mut alternates = clean_synonyms(term, raw, category);
        for variant in term_variants(term, category) {
            if !alternates.iter().any(|a| a.eq_ignore_ascii_case(&variant)) {
                alternates.push(variant);
            }
        }
        if category == Category::Keyword && alternates.len() > MAX_KEYWORD_SYNONYMS {
            warn!(
                term,
                synonyms = alternates.len(),
                "keyword expansion too broad, searching literal term only"
            );
            return SynonymSet::degraded(term, "expansion too broad");
        }

        let set = SynonymSet::new(term, alternates);
        debug!(term, %category, synonyms = set.len(), "synonyms resolved");
        set
    }
}

fn degrade(term: &str, category: Category, err: &LookupError) -> SynonymSet {
    warn!(term, %category, error = %err, "synonym lookup failed, searching literal term only");
    SynonymSet::degraded(term, err.to_string())
}
