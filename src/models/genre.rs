use serde::{Deserialize, Serialize};

/// A book genre.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Genre {
    pub id: String,
    pub name: String,
}
