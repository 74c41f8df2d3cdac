//! Parsing of package requirement specifiers.
//!
//! The request surface is a free-text list, one specifier per line:
//! a plain name, a name with a version constraint (`name==1.2`,
//! `name>=2.0`, ...), a name with extras (`name[extra]`), or a direct
//! URL reference (`name @ https://...` or a bare URL). Blank lines and
//! `#` comments are ignored.

use std::cmp::Ordering;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequirementError {
    #[error("empty requirement specifier")]
    Empty,

    #[error("malformed requirement specifier: '{0}'")]
    BadSpecifier(String),

    #[error("invalid package name in specifier: '{0}'")]
    BadName(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

/// A version bound, e.g. the `==2.31.0` in `requests==2.31.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub op: CmpOp,
    pub version: String,
}

/// One parsed specifier from the request list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub extras: Vec<String>,
    pub constraint: Option<Constraint>,
    pub url: Option<String>,
    /// The specifier exactly as requested, for installer invocation and
    /// log lines.
    pub raw: String,
}

impl Requirement {
    /// True when the offline cache can satisfy this specifier: no URL, no
    /// extras, and at least one of the cached `versions` inside the
    /// constraint (no constraint accepts any cached version).
    pub fn satisfiable_from<'a>(&self, versions: impl IntoIterator<Item = &'a str>) -> bool {
        if self.url.is_some() || !self.extras.is_empty() {
            return false;
        }
        versions.into_iter().any(|v| self.matches_version(v))
    }

    pub fn matches_version(&self, version: &str) -> bool {
        match &self.constraint {
            None => true,
            Some(c) => {
                let ord = compare_versions(version, &c.version);
                match c.op {
                    CmpOp::Eq => ord == Ordering::Equal,
                    CmpOp::Ne => ord != Ordering::Equal,
                    CmpOp::Ge => ord != Ordering::Less,
                    CmpOp::Gt => ord == Ordering::Greater,
                    CmpOp::Le => ord != Ordering::Greater,
                    CmpOp::Lt => ord == Ordering::Less,
                }
            }
        }
    }
}

/// Parse a full request list: one specifier per line, blank lines and
/// `#` comments skipped.
pub fn parse_requirements(text: &str) -> Result<Vec<Requirement>, RequirementError> {
    let mut requirements = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        requirements.push(parse_requirement(line)?);
    }
    Ok(requirements)
}

/// Parse a single specifier.
pub fn parse_requirement(spec: &str) -> Result<Requirement, RequirementError> {
    let raw = spec.trim().to_string();
    if raw.is_empty() {
        return Err(RequirementError::Empty);
    }

    // Direct reference: `name @ url`.
    if let Some((head, tail)) = raw.split_once('@') {
        if tail.contains("://") {
            let (name, extras) = split_extras(head.trim())?;
            validate_name(&name, &raw)?;
            return Ok(Requirement {
                name,
                extras,
                constraint: None,
                url: Some(tail.trim().to_string()),
                raw,
            });
        }
    }

    // Bare URL.
    if raw.contains("://") {
        return Ok(Requirement {
            name: String::new(),
            extras: Vec::new(),
            constraint: None,
            url: Some(raw.clone()),
            raw,
        });
    }

    let (head, constraint) = split_constraint(&raw)?;
    let (name, extras) = split_extras(head)?;
    validate_name(&name, &raw)?;

    Ok(Requirement {
        name,
        extras,
        constraint,
        url: None,
        raw,
    })
}

fn split_constraint(spec: &str) -> Result<(&str, Option<Constraint>), RequirementError> {
    let idx = match spec.find(['=', '<', '>', '!', '~']) {
        Some(idx) => idx,
        None => return Ok((spec, None)),
    };
    let (head, tail) = spec.split_at(idx);

    let (op, rest) = if let Some(rest) = tail.strip_prefix("==") {
        (CmpOp::Eq, rest)
    } else if let Some(rest) = tail.strip_prefix("!=") {
        (CmpOp::Ne, rest)
    } else if let Some(rest) = tail.strip_prefix(">=") {
        (CmpOp::Ge, rest)
    } else if let Some(rest) = tail.strip_prefix("<=") {
        (CmpOp::Le, rest)
    } else if let Some(rest) = tail.strip_prefix('>') {
        (CmpOp::Gt, rest)
    } else if let Some(rest) = tail.strip_prefix('<') {
        (CmpOp::Lt, rest)
    } else {
        return Err(RequirementError::BadSpecifier(spec.to_string()));
    };

    let version = rest.trim();
    if version.is_empty() {
        return Err(RequirementError::BadSpecifier(spec.to_string()));
    }

    Ok((
        head.trim_end(),
        Some(Constraint {
            op,
            version: version.to_string(),
        }),
    ))
}

fn split_extras(head: &str) -> Result<(String, Vec<String>), RequirementError> {
    let head = head.trim();
    let (name, rest) = match head.split_once('[') {
        Some((name, rest)) => (name, rest),
        None => return Ok((head.to_string(), Vec::new())),
    };
    let inner = rest
        .strip_suffix(']')
        .ok_or_else(|| RequirementError::BadSpecifier(head.to_string()))?;
    let extras = inner
        .split(',')
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();
    Ok((name.trim().to_string(), extras))
}

fn validate_name(name: &str, raw: &str) -> Result<(), RequirementError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(RequirementError::BadName(raw.to_string()))
    }
}

/// Compare two dotted version strings segment by segment.
///
/// Segments compare numerically when both parse as integers and
/// lexicographically otherwise; missing segments count as zero, so
/// `2.31` equals `2.31.0`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let pa: Vec<&str> = a.split('.').collect();
    let pb: Vec<&str> = b.split('.').collect();

    for i in 0..pa.len().max(pb.len()) {
        let sa = pa.get(i).copied().unwrap_or("0");
        let sb = pb.get(i).copied().unwrap_or("0");
        let ord = match (sa.parse::<u64>(), sb.parse::<u64>()) {
            (Ok(na), Ok(nb)) => na.cmp(&nb),
            _ => sa.cmp(sb),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
