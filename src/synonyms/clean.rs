use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Category, GeneFamily};

/// Synonyms shorter than this (in characters) are discarded.
const MIN_SYNONYM_LEN: usize = 3;

/// Fragments that mark curation notes, citations or definitions rather than names.
const NOISE_INDICATORS: &[&str] = &[
    ":", "@", " email ", "doi.org", "wikipedia", "github", "todo ", " et al", "th ed.", "[wp]",
    "see also", "see article", "editor note", "taxon notes ", "consider merging",
    "mapping confirmed", "partof ", "requires expert input", "umls cui", "synonyms", " doid ",
    "doid/", "xref ", "definition based on", "characterized by", "symptoms ",
    "believed to be derived from", "occurs in", "are different", "term renamed",
];

/// Gene aliases that are also common abbreviations or words in the literature.
const COMMON_GENE_NOISE: &[&str] = &[
    "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE", "LEU", "LYS", "MET",
    "PHE", "PRO", "PYL", "SEC", "SER", "THR", "TRP", "TYR", "VAL", "CO2", "HCN", "MCL", "JAN",
    "FEB", "MAR", "APR", "APRIL", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC", "ABS",
    "ACT", "ADP", "AGE", "AIM", "AKA", "ALP", "ALS", "AMP", "ANOVA", "ARIA", "BLAST", "BP",
    "CAD", "CAM", "CAMP", "CAP", "CAS", "CERT", "DANCE", "ERA", "ES", "FDA", "FIG", "GAP", "HAS",
    "MAP", "MICE", "PCR", "RR", "SAD", "SET", "SHE", "TEN", "WAS",
];

const HYPHENS: &[char] = &['-', '\u{2013}', '\u{2014}', '\u{2011}'];

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[(\[]([^)\]]*)[)\]]").expect("valid regex"));
static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid regex"));
static HAS_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").expect("valid regex"));
static ROMAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[IVX]+$").expect("valid regex"));
static LETTERS_THEN_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]{2,}?)(\d+[A-Za-z]?)$").expect("valid regex"));
static LETTERS_SPACE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]{2,}) (\d+[A-Za-z]?)$").expect("valid regex"));
static SYSTEMATIC_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[Cc]\d+orf\d+|UNQ\d+/PRO\d+|KIAA\d+)$").expect("valid regex")
});

/// Greek letter names and the characters (true letters and common lookalikes)
/// the literature writes for them.
const GREEK: &[(&str, &[&str])] = &[
    ("alpha", &["α", "𝛂", "𝛼"]),
    ("beta", &["β", "ϐ", "𝛽", "ᵝ"]),
    ("gamma", &["γ", "𝛄", "ℽ", "𝛾"]),
    ("delta", &["δ", "𝛿", "ẟ"]),
    ("epsilon", &["ε", "ɛ", "ϵ"]),
    ("zeta", &["ζ", "𝛇"]),
    ("eta", &["η"]),
    ("theta", &["Θ", "ϑ", "Ѳ"]),
    ("iota", &["Ι", "Ɩ"]),
    ("kappa", &["Κ", "ϰ"]),
    ("lambda", &["Λ"]),
    ("mu", &["Μ", "µ", "𝜇", "𝝁"]),
    ("nu", &["Ν", "𝜈"]),
    ("xi", &["ξ"]),
    ("omicron", &["Ο"]),
    ("pi", &["Π", "ϖ", "𝜋"]),
    ("rho", &["Ρ"]),
    ("sigma", &["Σ", "ς", "𝜎"]),
    ("tau", &["Τ"]),
    ("upsilon", &["Υ", "ϒ"]),
    ("phi", &["φ", "ϕ", "Ф"]),
    ("chi", &["χ"]),
    ("psi", &["ψ", "𝛹"]),
    ("omega", &["Ω", "ѡ"]),
];

struct GreekLetter {
    name: &'static str,
    chars: &'static [&'static str],
    /// The name standing alone, or next to digits and punctuation.
    word: Regex,
    /// A bare numbered letter such as `gamma 2` is too ambiguous to keep.
    numbered: Regex,
}

static GREEK_LETTERS: LazyLock<Vec<GreekLetter>> = LazyLock::new(|| {
    GREEK
        .iter()
        .map(|&(name, chars)| GreekLetter {
            name,
            chars,
            word: Regex::new(&format!(r"(?i)(^|[^a-z]){name}($|[^a-z])")).expect("valid regex"),
            numbered: Regex::new(&format!(r"(?i)^{name}\s?\d+$")).expect("valid regex"),
        })
        .collect()
});

static TYPE_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    let greek: Vec<&str> = GREEK.iter().map(|(name, _)| *name).collect();
    Regex::new(&format!(
        r"(?i)\btype\s*(?:\d+[a-z]?\b|(?:{})\b|[ivx]+\b|[a-z]\b)",
        greek.join("|")
    ))
    .expect("valid regex")
});
static TRAILING_CHAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+chains?$").expect("valid regex"));
static FAMILY_MEMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9]*?[A-Za-z])[\s,]*(\d+[A-Za-z]?\d*)$").expect("valid regex")
});
static MEMBER_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[A-Za-z]?\d*$").expect("valid regex"));

/// Family roots shorter than this (`IL`, `CD`) match far too much.
const MIN_FAMILY_ROOT_LEN: usize = 3;

/// Clean raw names returned by a lookup service into alternates for `original`.
///
/// The returned list never contains `original` itself; callers build the
/// `SynonymSet` around it.
pub(crate) fn clean_synonyms(original: &str, raw: Vec<String>, category: Category) -> Vec<String> {
    let contains_original = word_matcher(original);

    let mut seen = HashSet::new();
    let filtered: Vec<String> = raw
        .into_iter()
        .filter(|name| !is_noise(name))
        .map(|name| normalise(&name))
        .filter(|name| name.chars().count() >= MIN_SYNONYM_LEN)
        .filter(|name| !contains_original.is_match(name))
        .filter(|name| match category {
            Category::Gene(_) => !is_common_gene_noise(name),
            Category::Tissue => !is_letter_code(name),
            _ => true,
        })
        .filter(|name| seen.insert(name.to_lowercase()))
        .collect();

    let cleaned = remove_redundant(filtered);
    let cleaned = expand_greek_letters(strip_trailing_chain(expand_types(cleaned)));
    let cleaned = if matches!(category, Category::Gene(_)) {
        with_spacing_variants(cleaned)
    } else {
        cleaned
    };

    let mut seen = HashSet::from([original.trim().to_lowercase()]);
    cleaned
        .into_iter()
        .filter(|name| name.chars().count() >= MIN_SYNONYM_LEN)
        .filter(|name| seen.insert(name.to_lowercase()))
        .collect()
}

/// New forms of the input term itself: reordered types, Greek letter spellings
/// and, for genes, letter/number spacing.
pub(crate) fn term_variants(term: &str, category: Category) -> Vec<String> {
    let term = term.trim();
    let mut variants = expand_greek_letters(expand_types(vec![term.to_string()]));
    if matches!(category, Category::Gene(_)) {
        variants = with_spacing_variants(variants);
    }
    let mut seen = HashSet::from([term.to_lowercase()]);
    variants.retain(|v| seen.insert(v.to_lowercase()));
    variants
}

fn is_noise(name: &str) -> bool {
    let lower = name.to_lowercase();
    if lower.starts_with("go:") {
        return false;
    }
    if NOISE_INDICATORS.iter().any(|n| lower.contains(n)) {
        return true;
    }
    name.contains('.') && !HAS_DIGIT.is_match(name)
}

/// Strip punctuation the search service treats as equivalent to whitespace.
fn normalise(name: &str) -> String {
    let mut name = name
        .replace("EXACT", " ")
        .replace("susceptibility to", " ")
        .replace(['_', ',', '?', '"', '\u{201C}', '\u{201D}'], " ")
        .replace(HYPHENS, " ");

    name = BRACKETED
        .replace_all(&name, |caps: &regex::Captures| {
            let inner = caps[1].trim();
            if HAS_DIGIT.is_match(inner) || inner.split_whitespace().any(|w| ROMAN.is_match(w)) {
                format!(" {inner} ")
            } else {
                " ".to_string()
            }
        })
        .into_owned();
    name = name.replace(['(', ')', '[', ']', '\n'], " ");
    MULTI_SPACE.replace_all(&name, " ").trim().to_string()
}

fn is_common_gene_noise(name: &str) -> bool {
    let upper = name.to_uppercase();
    COMMON_GENE_NOISE.contains(&upper.as_str())
}

/// Tissue codes such as `A10` are almost always unrelated matches.
fn is_letter_code(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.as_str().chars().all(|c| c.is_ascii_digit())
}

/// Whole-word, case-insensitive matcher for `term`.
pub(crate) fn word_matcher(term: &str) -> Regex {
    let pattern = format!(r"(?i)(?:^|\W){}(?:$|\W)", regex::escape(term.trim()));
    Regex::new(&pattern).expect("escaped pattern is valid")
}

/// Drop every synonym that contains a shorter synonym as a whole word: a phrase
/// search for the shorter one already matches it.
fn remove_redundant(syns: Vec<String>) -> Vec<String> {
    let mut by_length: Vec<&String> = syns.iter().collect();
    by_length.sort_by_key(|s| s.split_whitespace().count());

    let mut redundant: HashSet<&str> = HashSet::new();
    for shorter in by_length {
        if redundant.contains(shorter.as_str()) {
            continue;
        }
        let matcher = word_matcher(shorter);
        for other in &syns {
            if other != shorter && matcher.is_match(other) {
                redundant.insert(other.as_str());
            }
        }
    }

    syns.iter()
        .filter(|s| !redundant.contains(s.as_str()))
        .cloned()
        .collect()
}

/// Phrase search treats `ADAMTS-5` and `ADAMTS 5` alike but not `ADAMTS5`, so add
/// the spaced and unspaced form of each letter+number name.
fn with_spacing_variants(syns: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = syns.iter().map(|s| s.to_lowercase()).collect();
    let mut variants = Vec::new();

    for syn in &syns {
        if SYSTEMATIC_NAME.is_match(syn) {
            continue;
        }
        let variant = if let Some(caps) = LETTERS_THEN_NUMBER.captures(syn) {
            format!("{} {}", &caps[1], &caps[2])
        } else if let Some(caps) = LETTERS_SPACE_NUMBER.captures(syn) {
            format!("{}{}", &caps[1], &caps[2])
        } else {
            continue;
        };
        if seen.insert(variant.to_lowercase()) {
            variants.push(variant);
        }
    }

    let mut all = syns;
    all.extend(variants);
    all
}

/// Add both word orders of every `type N` phrase: `collagen type 1` and
/// `type 1 collagen`.
fn expand_types(syns: Vec<String>) -> Vec<String> {
    let mut variants = Vec::new();
    for syn in &syns {
        let Some(m) = TYPE_PHRASE.find(syn) else {
            continue;
        };
        let phrase = m.as_str().trim();
        let rest = format!("{} {}", &syn[..m.start()], &syn[m.end()..]);
        let rest = MULTI_SPACE.replace_all(rest.trim(), " ");
        if rest.is_empty() {
            continue;
        }
        variants.push(format!("{rest} {phrase}"));
        variants.push(format!("{phrase} {rest}"));
    }
    dedup_extend(syns, variants)
}

/// `hemoglobin beta chain` is written `hemoglobin beta` just as often.
fn strip_trailing_chain(syns: Vec<String>) -> Vec<String> {
    let stripped = syns
        .into_iter()
        .map(|syn| {
            let trimmed = TRAILING_CHAIN.replace(&syn, "");
            if trimmed.trim().is_empty() {
                syn
            } else {
                trimmed.trim().to_string()
            }
        })
        .collect();
    dedup_extend(stripped, Vec::new())
}

/// Spell every Greek letter as its name and as each of its characters.
/// Bare numbered letters (`gamma 2`) are dropped.
fn expand_greek_letters(syns: Vec<String>) -> Vec<String> {
    let mut kept = Vec::with_capacity(syns.len());
    let mut variants = Vec::new();
    for syn in syns {
        if GREEK_LETTERS.iter().any(|g| g.numbered.is_match(&syn)) {
            continue;
        }
        for letter in GREEK_LETTERS.iter() {
            if letter.word.is_match(&syn) {
                for c in letter.chars {
                    let replacement = format!("${{1}}{c}${{2}}");
                    variants.push(letter.word.replace_all(&syn, replacement.as_str()).into_owned());
                }
            }
            for c in letter.chars.iter().filter(|c| syn.contains(**c)) {
                variants.extend(
                    letter
                        .chars
                        .iter()
                        .filter(|other| *other != c)
                        .map(|other| syn.replace(c, other)),
                );
                variants.push(syn.replace(c, letter.name));
            }
        }
        kept.push(syn);
    }
    dedup_extend(kept, variants)
}

/// `base` followed by the `extra` entries not already present, ignoring case.
fn dedup_extend(base: Vec<String>, extra: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    base.into_iter()
        .chain(extra)
        .filter(|s| seen.insert(s.to_lowercase()))
        .collect()
}

/// The root of a numbered family member name: `ADAMTS` for `ADAMTS5`.
fn family_root(name: &str) -> Option<&str> {
    let caps = FAMILY_MEMBER.captures(name.trim())?;
    let root = caps.get(1)?.as_str();
    (root.len() >= MIN_FAMILY_ROOT_LEN && !root.eq_ignore_ascii_case("type")).then_some(root)
}

/// Family roots among a gene's names, each with the member numbers that
/// follow it there, so that list mentions such as `ADAMTS4 and 5` can be
/// recognised.
pub(crate) fn gene_families(gene_terms: &[String]) -> Vec<GeneFamily> {
    let mut families: Vec<GeneFamily> = Vec::new();
    for term in gene_terms.iter().filter(|t| !SYSTEMATIC_NAME.is_match(t)) {
        let Some(root) = family_root(term) else {
            continue;
        };
        if families.iter().any(|f| f.root == root) {
            continue;
        }
        let mut seen = HashSet::new();
        let members: Vec<String> = gene_terms
            .iter()
            .filter_map(|t| t.strip_prefix(root))
            .map(|rest| rest.trim_matches([' ', ',']))
            .filter(|part| MEMBER_PART.is_match(part) && seen.insert(part.to_lowercase()))
            .map(String::from)
            .collect();
        if !members.is_empty() {
            families.push(GeneFamily {
                root: root.to_string(),
                members,
            });
        }
    }
    families
}
