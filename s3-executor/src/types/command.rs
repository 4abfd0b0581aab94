use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Operations a step can request from the executor.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Command {
    /// Create the bucket, or empty it when it already exists
    CreateOrResetBucket,
    ReadObject,
    WriteObject,
    DeleteObject,
}

impl Command {
    /// Wire names of every command, in declaration order.
    pub fn names() -> Vec<&'static str> {
        Command::iter().map(<&'static str>::from).collect()
    }
}
