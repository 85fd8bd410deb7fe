use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::grab::{GrabError, GrabResult};

/// Window over which a subreddit's top posts are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Day,
    Week,
    Month,
    Year,
    All,
}

impl Timeframe {
    /// The value the listing API expects in its `t` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Day => "day",
            Timeframe::Week => "week",
            Timeframe::Month => "month",
            Timeframe::Year => "year",
            Timeframe::All => "all",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(Timeframe::Day),
            "week" => Ok(Timeframe::Week),
            "month" => Ok(Timeframe::Month),
            "year" => Ok(Timeframe::Year),
            "all" => Ok(Timeframe::All),
            other => Err(format!(
                "invalid timeframe '{}', expected one of: day, week, month, year, all",
                other
            )),
        }
    }
}

/// A single configured fetch unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub destination: PathBuf,
    pub timeframe: Timeframe,
    pub limit: u32,
}

/// Per-field lists as they arrive from flags or the config file.
///
/// Each list is resolved independently, so nothing guarantees they line up.
/// [`TargetLists::into_targets`] is the single place where that gets checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetLists {
    pub names: Vec<String>,
    pub destinations: Vec<PathBuf>,
    pub timeframes: Vec<Timeframe>,
    pub limits: Vec<u32>,
}

impl TargetLists {
    /// Builds lists from already-paired targets.
    #[cfg(test)]
    pub fn from_targets(targets: &[Target]) -> Self {
        Self {
            names: targets.iter().map(|t| t.name.clone()).collect(),
            destinations: targets.iter().map(|t| t.destination.clone()).collect(),
            timeframes: targets.iter().map(|t| t.timeframe).collect(),
            limits: targets.iter().map(|t| t.limit).collect(),
        }
    }

    pub fn lengths_match(&self) -> bool {
        let len = self.names.len();
        self.destinations.len() == len && self.timeframes.len() == len && self.limits.len() == len
    }

    /// Zips the lists into targets, rejecting mismatched lengths and zero limits.
    pub fn into_targets(self) -> GrabResult<Vec<Target>> {
        if !self.lengths_match() {
            return Err(GrabError::LengthMismatch {
                names: self.names.len(),
                destinations: self.destinations.len(),
                timeframes: self.timeframes.len(),
                limits: self.limits.len(),
            });
        }

        if let Some(position) = self.limits.iter().position(|&limit| limit == 0) {
            return Err(GrabError::InvalidLimit {
                name: self.names[position].clone(),
            });
        }

        let targets = self
            .names
            .into_iter()
            .zip(self.destinations)
            .zip(self.timeframes)
            .zip(self.limits)
            .map(|(((name, destination), timeframe), limit)| Target {
                name,
                destination,
                timeframe,
                limit,
            })
            .collect();

        Ok(targets)
    }
}
