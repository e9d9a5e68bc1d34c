use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::QueryError;

static FIELD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z_]*$").expect("valid regex"));

/// Inclusive publication year range, e.g. `2010-2020`, `2015-` or `2019`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearRange {
    pub from: Option<u16>,
    pub to: Option<u16>,
}

impl FromStr for YearRange {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || QueryError::InvalidYearRange(s.to_string());
        let parse = |part: &str| -> Result<Option<u16>, QueryError> {
            let part = part.trim();
            if part.is_empty() {
                return Ok(None);
            }
            part.parse::<u16>().map(Some).map_err(|_| invalid())
        };

        let range = match s.split_once('-') {
            Some((from, to)) => Self {
                from: parse(from)?,
                to: parse(to)?,
            },
            None => {
                let year = parse(s)?.ok_or_else(invalid)?;
                Self {
                    from: Some(year),
                    to: Some(year),
                }
            }
        };

        match (range.from, range.to) {
            (None, None) => Err(invalid()),
            (Some(from), Some(to)) if from > to => Err(invalid()),
            _ => Ok(range),
        }
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // open ends use the widest years the service accepts
        let from = self.from.unwrap_or(1000);
        let to = self.to.unwrap_or(3000);
        write!(f, "PUB_YEAR:[{from} TO {to}]")
    }
}

/// Extra search parameters appended to every expression of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdvancedSearch {
    pub pub_year: Option<YearRange>,
    pub open_access: bool,
    pub has_abstract: bool,
    /// Record source such as `MED` or `PPR`.
    pub source: Option<String>,
    /// Arbitrary `FIELD:value` pairs.
    pub fields: BTreeMap<String, String>,
    /// Verbatim clause, only checked for balanced quotes and parentheses.
    pub raw: Option<String>,
}

impl AdvancedSearch {
    pub fn is_empty(&self) -> bool {
        self.to_clause().is_none()
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        for name in self.fields.keys() {
            if !FIELD_NAME.is_match(name) {
                return Err(QueryError::InvalidField(name.clone()));
            }
        }
        if let Some(source) = &self.source
            && !source.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(QueryError::InvalidField(format!("SRC:{source}")));
        }
        if let Some(raw) = &self.raw {
            check_balanced(raw)?;
        }
        Ok(())
    }

    /// All parameters joined with ` AND `, or `None` when nothing is set.
    pub fn to_clause(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        if let Some(years) = self.pub_year {
            parts.push(years.to_string());
        }
        if self.open_access {
            parts.push("OPEN_ACCESS:y".to_string());
        }
        if self.has_abstract {
            parts.push("HAS_ABSTRACT:y".to_string());
        }
        if let Some(source) = &self.source {
            parts.push(format!("SRC:{}", source.to_uppercase()));
        }
        for (name, value) in &self.fields {
            parts.push(format!("{name}:{}", field_value(value)));
        }
        if let Some(raw) = self.raw.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            parts.push(format!("({raw})"));
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" AND "))
        }
    }
}

fn field_value(value: &str) -> String {
    let value = value.trim().replace('"', "");
    if value.contains(char::is_whitespace) {
        format!("\"{value}\"")
    } else {
        value
    }
}

fn check_balanced(raw: &str) -> Result<(), QueryError> {
    let mut depth: i32 = 0;
    let mut in_quotes = false;
    for c in raw.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                depth -= 1;
                if depth < 0 {
                    return Err(QueryError::Unbalanced(raw.to_string()));
                }
            }
            _ => {}
        }
    }
    if depth != 0 || in_quotes {
        return Err(QueryError::Unbalanced(raw.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_range_parses_closed_open_and_single_forms() {
        assert_eq!(
            "2010-2020".parse::<YearRange>().unwrap(),
            YearRange {
                from: Some(2010),
                to: Some(2020)
            }
        );
        assert_eq!("2015-".parse::<YearRange>().unwrap().to, None);
        assert_eq!("2019".parse::<YearRange>().unwrap().to, Some(2019));
        assert!("2020-2010".parse::<YearRange>().is_err());
        assert!("-".parse::<YearRange>().is_err());
        assert!("twenty".parse::<YearRange>().is_err());
    }

    #[test]
    fn open_ended_year_range_renders_with_wide_bound() {
        let range: YearRange = "-2005".parse().unwrap();
        assert_eq!(range.to_string(), "PUB_YEAR:[1000 TO 2005]");
    }

    #[test]
    fn empty_search_has_no_clause() {
        let advanced = AdvancedSearch::default();
        assert!(advanced.is_empty());
        assert!(advanced.validate().is_ok());
    }

    #[test]
    fn clause_joins_every_parameter_in_fixed_order() {
        let advanced = AdvancedSearch {
            pub_year: Some("2010-2020".parse().unwrap()),
            open_access: true,
            has_abstract: true,
            source: Some("med".into()),
            fields: BTreeMap::from([
                ("LANG".to_string(), "eng".to_string()),
                ("JOURNAL".to_string(), "Nature Genetics".to_string()),
            ]),
            raw: Some("NOT PUB_TYPE:\"review\"".into()),
        };
        assert!(advanced.validate().is_ok());
        assert_eq!(
            advanced.to_clause().unwrap(),
            "PUB_YEAR:[2010 TO 2020] AND OPEN_ACCESS:y AND HAS_ABSTRACT:y AND SRC:MED \
             AND JOURNAL:\"Nature Genetics\" AND LANG:eng AND (NOT PUB_TYPE:\"review\")"
        );
    }

    #[test]
    fn lowercase_field_name_is_rejected() {
        let advanced = AdvancedSearch {
            fields: BTreeMap::from([("lang".to_string(), "eng".to_string())]),
            ..Default::default()
        };
        assert!(matches!(
            advanced.validate(),
            Err(QueryError::InvalidField(name)) if name == "lang"
        ));
    }

    #[test]
    fn unbalanced_raw_clause_is_rejected() {
        for raw in ["(A OR B", "A) OR (B", "TITLE:\"open"] {
            let advanced = AdvancedSearch {
                raw: Some(raw.into()),
                ..Default::default()
            };
            assert!(
                matches!(advanced.validate(), Err(QueryError::Unbalanced(_))),
                "{raw}"
            );
        }
    }

    #[test]
    fn parentheses_inside_quotes_do_not_count() {
        assert!(check_balanced("TITLE:\"a (b\"").is_ok());
    }
}
