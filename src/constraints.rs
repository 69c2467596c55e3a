//! Parsing and checking of application constraints, e.g. `cores=2 mem=4G`
//!
//! See https://juju.is/docs/olm/constraint

use std::collections::HashSet;

use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::{char as character, multispace0, multispace1};
use nom::multi::separated_list;
use nom::sequence::{delimited, separated_pair};
use nom::IResult;

use crate::report::Issue;

/// Constraint keys understood by Juju
pub const KNOWN_KEYS: &[&str] = &[
    "allocate-public-ip",
    "arch",
    "container",
    "cores",
    "cpu-cores",
    "cpu-power",
    "image-id",
    "instance-role",
    "instance-type",
    "mem",
    "root-disk",
    "root-disk-source",
    "spaces",
    "tags",
    "virt-type",
    "zones",
];

/// A single `key=value` token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub key: String,
    pub value: String,
}

fn parse_key(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_lowercase() || c == '-')(input)
}

fn parse_value(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| !c.is_whitespace())(input)
}

fn parse_constraint(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(parse_key, character('='), parse_value)(input)
}

fn parse_constraints(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    delimited(
        multispace0,
        separated_list(multispace1, parse_constraint),
        multispace0,
    )(input)
}

/// Split a constraints string into its tokens
pub fn parse(input: &str) -> Result<Vec<Constraint>, String> {
    let (remainder, pairs) = parse_constraints(input)
        .map_err(|err| format!("Couldn't parse constraints `{}`: {:?}", input, err))?;

    if !remainder.is_empty() {
        return Err(format!(
            "`{}` is not a `key=value` constraint",
            remainder.split_whitespace().next().unwrap_or(remainder)
        ));
    }

    Ok(pairs
        .into_iter()
        .map(|(k, v)| Constraint {
            key: k.to_string(),
            value: v.to_string(),
        })
        .collect())
}

/// Whether a value looks like `4096`, `4G`, `1.5T` etc.
fn is_size(value: &str) -> bool {
    let digits = value.trim_end_matches(|c| "MGTP".contains(c));
    if value.len() - digits.len() > 1 {
        return false;
    }
    digits.starts_with(|c: char| c.is_ascii_digit())
        && digits.parse::<f64>().map(|v| v >= 0.0).unwrap_or(false)
}

fn check_value(constraint: &Constraint) -> Option<Issue> {
    let Constraint { key, value } = constraint;
    let ok = match key.as_str() {
        "cores" | "cpu-cores" | "cpu-power" => value.parse::<u64>().is_ok(),
        "mem" | "root-disk" => is_size(value),
        "allocate-public-ip" => value == "true" || value == "false",
        _ => true,
    };

    if ok {
        None
    } else {
        Some(Issue::Type(format!(
            "constraint `{}` has invalid value `{}`",
            key, value
        )))
    }
}

/// Check a constraints string, reporting every bad token
///
/// `extra_keys` are accepted on top of [`KNOWN_KEYS`].
pub fn check(input: &str, extra_keys: &[String]) -> Vec<Issue> {
    let constraints = match parse(input) {
        Ok(c) => c,
        Err(err) => return vec![Issue::Structural(err)],
    };

    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for constraint in &constraints {
        let known = KNOWN_KEYS.contains(&constraint.key.as_str())
            || extra_keys.iter().any(|k| k == &constraint.key);

        if !known {
            issues.push(Issue::Reference(format!(
                "unknown constraint `{}`",
                constraint.key
            )));
            continue;
        }

        if !seen.insert(constraint.key.as_str()) {
            issues.push(Issue::Conflict(format!(
                "constraint `{}` is given more than once",
                constraint.key
            )));
            continue;
        }

        issues.extend(check_value(constraint));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::IssueKind;

    #[test]
    fn test_single() {
        let (remainder, parsed) = parse_constraint("mem=4G rest").unwrap();
        assert_eq!(parsed, ("mem", "4G"));
        assert_eq!(remainder, " rest");
    }

    #[test]
    fn test_parse() {
        let parsed = parse("  cpu-cores=1 mem=2048  root-disk=50G tags=a,b ").unwrap();
        let keys: Vec<_> = parsed.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["cpu-cores", "mem", "root-disk", "tags"]);
        assert_eq!(parsed[3].value, "a,b");
    }

    #[test]
    fn test_empty() {
        assert_eq!(parse("").unwrap(), vec![]);
        assert!(check("   ", &[]).is_empty());
    }

    #[test]
    fn test_malformed() {
        let issues = check("mem=4G fast", &[]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind(), IssueKind::Structural);
        assert!(issues[0].message().contains("fast"));
    }

    #[test]
    fn test_sizes() {
        assert!(is_size("2048"));
        assert!(is_size("4G"));
        assert!(is_size("1.5T"));
        assert!(!is_size("G"));
        assert!(!is_size("4GG"));
        assert!(!is_size("lots"));
        assert!(!is_size("inf"));
        assert!(!is_size("infinityG"));
        assert!(!is_size("NaN"));
        assert!(!is_size(".5G"));
    }

    #[test]
    fn test_unbounded_sizes() {
        let issues = check("mem=inf root-disk=infinity cores=2", &[]);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.kind() == IssueKind::Type));
    }

    #[test]
    fn test_check_all() {
        let issues = check("cores=two mem=4G gpu=1 mem=8G arch=amd64", &[]);
        let kinds: Vec<_> = issues.iter().map(Issue::kind).collect();
        assert_eq!(
            kinds,
            vec![IssueKind::Type, IssueKind::Reference, IssueKind::Conflict]
        );
    }

    #[test]
    fn test_extra_keys() {
        assert!(check("gpu=1", &["gpu".to_string()]).is_empty());
    }
}
