//! Extracts the owning agent of an issue from its assignee and description.
//!
//! Precedence, first match wins:
//!
//! 1. Explicit assignee name that is on the roster
//! 2. `## Agent: <name>` / `Agent: <name>` marker
//! 3. Named section: `<name>'s steps` or `<name> (<role>)`
//! 4. Dispatch line starting with `<Name>:`
//! 5. The roster's default owner
//!
//! Only roster names are recognized, so the parser never fails.

use regex::Regex;
use serde::Serialize;

use crate::config::Roster;
use crate::{Error, Result};

/// Which rule produced the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerSource {
    Explicit,
    Marker,
    Section,
    Dispatch,
    Fallback,
}

impl OwnerSource {
    /// True for every rule except the default-owner fallback.
    pub fn is_explicit_signal(&self) -> bool {
        !matches!(self, OwnerSource::Fallback)
    }
}

/// Canonical owner name plus the rule that matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedOwner {
    pub name: String,
    pub source: OwnerSource,
}

/// Owner parser compiled for one roster.
#[derive(Debug, Clone)]
pub struct OwnerParser {
    roster: Roster,
    marker: Regex,
    dispatch: Regex,
}

impl OwnerParser {
    pub fn new(roster: &Roster) -> Result<Self> {
        let names = roster
            .names()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");

        let marker = Regex::new(&format!(r"(?i)(?:##?\s*)?\bagent:\s*({})\b", names))
            .map_err(|e| Error::Configuration(format!("roster pattern: {}", e)))?;
        let dispatch = Regex::new(&format!(r"(?im)^({}):", names))
            .map_err(|e| Error::Configuration(format!("roster pattern: {}", e)))?;

        Ok(Self {
            roster: roster.clone(),
            marker,
            dispatch,
        })
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Resolve the owner of an issue.
    pub fn parse(&self, description: &str, explicit_assignee: Option<&str>) -> ParsedOwner {
        if let Some(name) = explicit_assignee.and_then(|a| self.roster.canonical(a)) {
            return self.owner(name, OwnerSource::Explicit);
        }

        if let Some(name) = self.marker.captures(description).and_then(|c| c.get(1)) {
            return self.owner(&name.as_str().to_lowercase(), OwnerSource::Marker);
        }

        let lower = description.to_lowercase();
        for (role, name) in self.roster.entries() {
            let steps = format!("{}'s steps", name);
            let titled = format!("{} ({})", name, role.as_str());
            if lower.contains(&steps) || lower.contains(&titled) {
                return self.owner(name, OwnerSource::Section);
            }
        }

        if let Some(name) = self.dispatch.captures(description).and_then(|c| c.get(1)) {
            return self.owner(&name.as_str().to_lowercase(), OwnerSource::Dispatch);
        }

        self.owner(self.roster.default_owner(), OwnerSource::Fallback)
    }

    fn owner(&self, name: &str, source: OwnerSource) -> ParsedOwner {
        ParsedOwner {
            name: name.to_string(),
            source,
        }
    }
}
