//! Enum types for Hermadata entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Animal sex as stored by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

/// How an animal entered the shelter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    /// Recovered from the territory.
    #[serde(rename = "R")]
    Rescue,
    /// Seized by authority order.
    #[serde(rename = "C")]
    Confiscation,
    /// Surrendered by a private owner.
    #[serde(rename = "S")]
    Surrender,
    /// Transferred in from another facility.
    #[serde(rename = "T")]
    Transfer,
}

/// How an animal left the shelter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitType {
    #[serde(rename = "A")]
    Adoption,
    #[serde(rename = "D")]
    Death,
    /// Returned to its original owner.
    #[serde(rename = "R")]
    Return,
    /// Transferred out to another facility.
    #[serde(rename = "T")]
    Transfer,
}

/// Which part of the shelter currently hosts the animal.
///
/// Every intake starts in the sanitary ward; the animal moves to the
/// shelter proper once cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimalStage {
    #[serde(rename = "sanitary")]
    Sanitary,
    #[serde(rename = "shelter")]
    Shelter,
}

/// Sort direction for paginated list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

impl fmt::Display for ExitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExitType::Adoption => "adoption",
            ExitType::Death => "death",
            ExitType::Return => "return",
            ExitType::Transfer => "transfer",
        };
        write!(f, "{}", label)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryType::Rescue => "rescue",
            EntryType::Confiscation => "confiscation",
            EntryType::Surrender => "surrender",
            EntryType::Transfer => "transfer",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_wire_codes() {
        assert_eq!(serde_json::to_string(&EntryType::Rescue).unwrap(), "\"R\"");
        assert_eq!(
            serde_json::from_str::<EntryType>("\"C\"").unwrap(),
            EntryType::Confiscation
        );
    }

    #[test]
    fn test_exit_type_wire_codes() {
        assert_eq!(serde_json::to_string(&ExitType::Adoption).unwrap(), "\"A\"");
        assert_eq!(
            serde_json::from_str::<ExitType>("\"R\"").unwrap(),
            ExitType::Return
        );
    }

    #[test]
    fn test_sex_wire_codes() {
        assert_eq!(serde_json::to_string(&Sex::Female).unwrap(), "\"F\"");
    }

    #[test]
    fn test_sort_order_round_trip() {
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!(SortOrder::Desc.to_string(), "desc");
        assert!("ascending".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_stage_wire_codes() {
        assert_eq!(
            serde_json::to_string(&AnimalStage::Sanitary).unwrap(),
            "\"sanitary\""
        );
    }
}
