use std::{fmt, str::FromStr};

use thiserror::Error;

use super::PartitionId;

/// Errors raised while parsing a part name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartNameError {
    /// Fewer than four `_`-separated components.
    #[error("part name `{0}` is not <partition>_<min>_<max>_<level>")]
    Malformed(String),
    /// A numeric component failed to parse.
    #[error("part name `{name}` has invalid {field}")]
    InvalidNumber {
        /// Name being parsed.
        name: String,
        /// Component that failed.
        field: &'static str,
    },
    /// `min_block` greater than `max_block`.
    #[error("part name `{0}` has min_block above max_block")]
    InvertedRange(String),
}

/// Parsed `<partition>_<min_block>_<max_block>_<level>` part name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartName {
    /// Partition id; may itself contain `_`.
    pub partition_id: PartitionId,
    /// Lowest block number.
    pub min_block: i64,
    /// Highest block number.
    pub max_block: i64,
    /// Merge level.
    pub level: u32,
}

impl PartName {
    /// Parse a part name. The partition id is everything before the last three components.
    pub fn parse(name: &str) -> Result<Self, PartNameError> {
        let mut fields = name.rsplitn(4, '_');
        let (Some(level), Some(max), Some(min), Some(partition)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(PartNameError::Malformed(name.to_owned()));
        };
        if partition.is_empty() {
            return Err(PartNameError::Malformed(name.to_owned()));
        }
        let number = |value: &str, field: &'static str| {
            value.parse::<i64>().map_err(|_| PartNameError::InvalidNumber {
                name: name.to_owned(),
                field,
            })
        };
        let min_block = number(min, "min_block")?;
        let max_block = number(max, "max_block")?;
        let level = level
            .parse::<u32>()
            .map_err(|_| PartNameError::InvalidNumber {
                name: name.to_owned(),
                field: "level",
            })?;
        if min_block > max_block {
            return Err(PartNameError::InvertedRange(name.to_owned()));
        }
        Ok(Self {
            partition_id: PartitionId::new(partition),
            min_block,
            max_block,
            level,
        })
    }
}

impl FromStr for PartName {
    type Err = PartNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PartName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.partition_id, self.min_block, self.max_block, self.level
        )
    }
}
