//! References to application endpoints, as used in bundle relations
//!
//! A reference is `<application>` or `<application>:<endpoint>`.

use std::fmt;
use std::str::FromStr;

use nom::bytes::complete::{tag, take_while1};
use nom::combinator::{opt, verify};
use nom::sequence::{pair, preceded};
use nom::IResult;

fn is_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
}

/// Parses an application name, e.g. `ubuntu-advantage`
///
/// Must start with a letter, and can't end with a dash.
fn parse_application(input: &str) -> IResult<&str, &str> {
    verify(take_while1(is_name_char), |s: &str| {
        s.starts_with(|c: char| c.is_ascii_lowercase()) && !s.ends_with('-')
    })(input)
}

/// Parses an endpoint name, e.g. `database-legacy`
fn parse_endpoint(input: &str) -> IResult<&str, &str> {
    verify(
        take_while1(|c: char| is_name_char(c) || c == '_'),
        |s: &str| s.starts_with(|c: char| c.is_ascii_lowercase()),
    )(input)
}

fn parse_reference(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    pair(parse_application, opt(preceded(tag(":"), parse_endpoint)))(input)
}

/// One side of a relation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointRef {
    pub application: String,

    /// May be left out when the application has only one fitting endpoint
    pub endpoint: Option<String>,
}

impl EndpointRef {
    pub fn new<S: Into<String>>(application: S, endpoint: Option<&str>) -> Self {
        EndpointRef {
            application: application.into(),
            endpoint: endpoint.map(String::from),
        }
    }

    pub fn parse(input: &str) -> Result<Self, String> {
        let (remainder, (application, endpoint)) = parse_reference(input)
            .map_err(|_| format!("`{}` is not a valid endpoint reference", input))?;

        if !remainder.is_empty() {
            return Err(format!(
                "Got extra data at end of endpoint reference `{}`: `{}`",
                input, remainder
            ));
        }

        Ok(EndpointRef::new(application, endpoint))
    }
}

impl FromStr for EndpointRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EndpointRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.endpoint {
            Some(ep) => write!(f, "{}:{}", self.application, ep),
            None => f.write_str(&self.application),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application() {
        let (remainder, parsed) = parse_application("livepatch:database").unwrap();
        assert_eq!(parsed, "livepatch");
        assert_eq!(remainder, ":database");

        assert!(parse_application("-livepatch").is_err());
        assert!(parse_application("livepatch-").is_err());
        assert!(parse_application("9lives").is_err());
    }

    #[test]
    fn test_endpoint() {
        let (remainder, parsed) = parse_endpoint("database-legacy").unwrap();
        assert_eq!(parsed, "database-legacy");
        assert_eq!(remainder, "");

        let (_, parsed) = parse_endpoint("cos_agent").unwrap();
        assert_eq!(parsed, "cos_agent");
    }

    #[test]
    fn test_full() {
        assert_eq!(
            "livepatch:database".parse::<EndpointRef>().unwrap(),
            EndpointRef::new("livepatch", Some("database"))
        );
        assert_eq!(
            "haproxy".parse::<EndpointRef>().unwrap(),
            EndpointRef::new("haproxy", None)
        );
    }

    #[test]
    fn test_invalid() {
        for input in &["", "livepatch:", "livepatch:database:extra", "Livepatch", "a b"] {
            assert!(input.parse::<EndpointRef>().is_err(), "{} parsed", input);
        }
    }

    #[test]
    fn test_display() {
        let parsed: EndpointRef = "ubuntu-advantage:juju-info".parse().unwrap();
        assert_eq!(parsed.to_string(), "ubuntu-advantage:juju-info");
    }
}
