//! The `charm:` value of a bundle application
//!
//! Either a store URL such as `ch:postgresql`, `cs:~user/haproxy-42` or just
//! `postgresql`, or a path to a local charm such as `./charms/livepatch`.

use std::fmt;
use std::str::FromStr;

use nom::bytes::complete::tag;
use nom::character::complete::{alpha1, digit1};
use nom::combinator::{map_res, opt};
use nom::sequence::{delimited, preceded, terminated, tuple};
use nom::{Err as NomErr, IResult, Needed};
use serde::de::Deserializer;
use serde::ser::Serializer;

/// Matches a `kebab-case` name that must not start or end with a dash
fn kebab_case(input: &str) -> IResult<&str, &str> {
    if input.is_empty() {
        return Err(NomErr::Incomplete(Needed::Size(1)));
    }

    // Find the first invalid character, and split at it.
    // A dash is only valid if it's not first and is followed by a letter,
    // otherwise `name-42` would swallow the revision.
    let index = input
        .chars()
        .enumerate()
        .find(|&(i, ch)| {
            let alpha_next = input
                .chars()
                .nth(i + 1)
                .map(|ch| ch.is_alphabetic())
                .unwrap_or(false);

            let valid_char = ch.is_ascii_alphanumeric();
            let valid_dash = ch == '-' && i != 0 && alpha_next;

            !(valid_char || valid_dash)
        })
        .map(|(i, _)| i);

    // split_at returns `(match, remainder)`, and nom likes `(remainder, match)`.
    match index {
        Some(i) => {
            let split = input.split_at(i);
            Ok((split.1, split.0))
        }
        None => Ok(("", input)),
    }
}

/// Parses a store prefix, e.g. `ch:` or `cs:`
fn parse_store(input: &str) -> IResult<&str, Option<&str>> {
    opt(terminated(alpha1, tag(":")))(input)
}

/// Parses a namespace, e.g. `~foo-charmers/`
fn parse_namespace(input: &str) -> IResult<&str, Option<&str>> {
    opt(delimited(tag("~"), kebab_case, tag("/")))(input)
}

/// Parses a trailing revision, e.g. `-42`
fn parse_revision(input: &str) -> IResult<&str, Option<&str>> {
    opt(preceded(tag("-"), digit1))(input)
}

fn parse_store_url(input: &str) -> IResult<&str, CharmURL> {
    let joined = tuple((parse_store, parse_namespace, kebab_case, parse_revision));

    map_res(joined, |(s, ns, n, r)| -> Result<CharmURL, String> {
        Ok(CharmURL {
            store: s.map(String::from),
            namespace: ns.map(String::from),
            name: n.to_string(),
            revision: r
                .map(|r| {
                    r.parse()
                        .map_err(|err| format!("Couldn't parse charm url revision: {}", err))
                })
                .transpose()?,
        })
    })(input)
}

/// A charm published to a store
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct CharmURL {
    pub store: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
    pub revision: Option<u32>,
}

impl CharmURL {
    pub fn parse(input: &str) -> Result<Self, String> {
        let (remainder, url) = parse_store_url(input)
            .map_err(|err| format!("Couldn't parse charm url `{}`: {:?}", input, err))?;

        if !remainder.is_empty() {
            return Err(format!(
                "Got extra data at end of charm url string: `{}`",
                remainder
            ));
        }

        if let Some(store) = &url.store {
            if store != "ch" && store != "cs" {
                return Err(format!("Unknown charm store `{}` in `{}`", store, input));
            }
        }

        Ok(url)
    }
}

impl fmt::Display for CharmURL {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(st) = &self.store {
            write!(f, "{}:", st)?;
        }

        if let Some(ns) = &self.namespace {
            write!(f, "~{}/", ns)?;
        }

        f.write_str(&self.name)?;

        if let Some(rev) = &self.revision {
            write!(f, "-{}", rev)?;
        }

        Ok(())
    }
}

/// Where an application's charm comes from
#[derive(Debug, PartialEq, Clone, Eq)]
pub enum CharmRef {
    Store(CharmURL),

    /// A path to a charm directory, relative paths being relative to the bundle
    Local(String),
}

impl CharmRef {
    pub fn parse(input: &str) -> Result<Self, String> {
        if input.starts_with('.') || input.starts_with('/') {
            Ok(CharmRef::Local(input.to_string()))
        } else {
            CharmURL::parse(input).map(CharmRef::Store)
        }
    }

    /// The charm name, if it can be known without loading the charm
    pub fn store_name(&self) -> Option<&str> {
        match self {
            CharmRef::Store(url) => Some(&url.name),
            CharmRef::Local(_) => None,
        }
    }
}

impl FromStr for CharmRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CharmRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CharmRef::Store(url) => fmt::Display::fmt(url, f),
            CharmRef::Local(path) => f.write_str(path),
        }
    }
}

impl serde::Serialize for CharmRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for CharmRef {
    fn deserialize<D>(deserializer: D) -> Result<CharmRef, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;

        s.parse()
            .map_err(|err| Error::custom(format!("Error deserializing charm: {}", err)))
    }
}
