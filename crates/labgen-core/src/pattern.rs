//! Pattern string parsing.
//!
//! Supported placeholders:
//! - `{index}` - row index, `{index:06}` zero-padded to six digits
//! - `{rand:N}` - random N-digit number
//! - `{pick:catalog}` - `value` column of a fresh draw from a catalog
//! - `{field}` - value of an earlier field of the same row
//! - `{parent.field}` - value of a field of the parent row
//! - `{field:lower}`, `{field:upper}`, `{field:slug}` - the same with a filter applied
//!
//! `{{` and `}}` produce literal braces.

use crate::schema::FieldRef;

/// Transformation applied to an interpolated field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Lowercase
    Lower,
    /// Uppercase
    Upper,
    /// Lowercase ASCII alphanumerics only
    Slug,
}

impl Filter {
    /// Apply the filter to a rendered value.
    pub fn apply(self, value: &str) -> String {
        match self {
            Filter::Lower => value.to_lowercase(),
            Filter::Upper => value.to_uppercase(),
            Filter::Slug => value
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_lowercase())
                .collect(),
        }
    }
}

/// One parsed piece of a pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternPart {
    /// Literal text
    Literal(String),
    /// Row index, optionally zero-padded
    Index { width: usize },
    /// Random number with exactly this many digits
    Random { digits: usize },
    /// Fresh draw from a catalog
    Pick { catalog: String },
    /// Interpolated field value
    Field {
        field: FieldRef,
        filter: Option<Filter>,
    },
}

/// Parse a pattern into its parts.
pub fn parse_pattern(pattern: &str) -> Result<Vec<PatternPart>, String> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut body = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => body.push(ch),
                        None => return Err(format!("unclosed placeholder in '{pattern}'")),
                    }
                }
                if !literal.is_empty() {
                    parts.push(PatternPart::Literal(std::mem::take(&mut literal)));
                }
                parts.push(parse_placeholder(&body)?);
            }
            '}' => return Err(format!("unmatched '}}' in '{pattern}'")),
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        parts.push(PatternPart::Literal(literal));
    }
    Ok(parts)
}

fn parse_placeholder(body: &str) -> Result<PatternPart, String> {
    let (name, modifier) = match body.split_once(':') {
        Some((name, modifier)) => (name.trim(), Some(modifier.trim())),
        None => (body.trim(), None),
    };

    match (name, modifier) {
        ("index", None) => Ok(PatternPart::Index { width: 0 }),
        ("index", Some(width)) => width
            .parse()
            .map(|width| PatternPart::Index { width })
            .map_err(|_| format!("invalid index width '{width}'")),
        ("rand", Some(digits)) => match digits.parse() {
            Ok(digits) if digits > 0 => Ok(PatternPart::Random { digits }),
            _ => Err(format!("invalid digit count '{digits}'")),
        },
        ("rand", None) => Err("'{rand}' needs a digit count, e.g. '{rand:4}'".to_string()),
        ("pick", Some(catalog)) if !catalog.is_empty() => Ok(PatternPart::Pick {
            catalog: catalog.to_string(),
        }),
        ("pick", _) => Err("'{pick}' needs a catalog name, e.g. '{pick:first_names}'".to_string()),
        (field, modifier) => {
            let filter = match modifier {
                None => None,
                Some("lower") => Some(Filter::Lower),
                Some("upper") => Some(Filter::Upper),
                Some("slug") => Some(Filter::Slug),
                Some(other) => return Err(format!("unknown filter '{other}'")),
            };
            Ok(PatternPart::Field {
                field: field.parse()?,
                filter,
            })
        }
    }
}

/// Field references used by a parsed pattern.
pub fn pattern_references(parts: &[PatternPart]) -> impl Iterator<Item = &FieldRef> {
    parts.iter().filter_map(|p| match p {
        PatternPart::Field { field, .. } => Some(field),
        _ => None,
    })
}

/// Catalogs drawn from by a parsed pattern.
pub fn pattern_catalogs(parts: &[PatternPart]) -> impl Iterator<Item = &str> {
    parts.iter().filter_map(|p| match p {
        PatternPart::Pick { catalog } => Some(catalog.as_str()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Scope;

    #[test]
    fn test_parse_index_and_literals() {
        let parts = parse_pattern("CUST-{index:06}").unwrap();
        assert_eq!(
            parts,
            vec![
                PatternPart::Literal("CUST-".to_string()),
                PatternPart::Index { width: 6 },
            ]
        );
    }

    #[test]
    fn test_parse_fields_with_filters() {
        let parts = parse_pattern("{first_name:lower}.{last_name:lower}@{parent.domain}").unwrap();
        assert_eq!(parts.len(), 5);

        let refs: Vec<_> = pattern_references(&parts).collect();
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[2].scope, Scope::Parent);
        assert_eq!(refs[2].field, "domain");
    }

    #[test]
    fn test_parse_catalog_pick() {
        let parts = parse_pattern("{pick:company_prefixes} {pick:company_suffixes}").unwrap();
        let catalogs: Vec<_> = pattern_catalogs(&parts).collect();
        assert_eq!(catalogs, vec!["company_prefixes", "company_suffixes"]);
        assert!(parse_pattern("{pick}").is_err());
    }

    #[test]
    fn test_escaped_braces() {
        let parts = parse_pattern("{{literal}}").unwrap();
        assert_eq!(parts, vec![PatternPart::Literal("{literal}".to_string())]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_pattern("user_{index").is_err());
        assert!(parse_pattern("a}b").is_err());
        assert!(parse_pattern("{rand}").is_err());
        assert!(parse_pattern("{rand:0}").is_err());
        assert!(parse_pattern("{name:reverse}").is_err());
        assert!(parse_pattern("{index:wide}").is_err());
    }

    #[test]
    fn test_slug_filter() {
        assert_eq!(Filter::Slug.apply("Acme Global, Inc."), "acmeglobalinc");
        assert_eq!(Filter::Lower.apply("Mary"), "mary");
    }
}
