use serde::{Deserialize, Serialize};

use super::Record;
use crate::id::ResourceId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    /// Minor units per major unit, e.g. 100 for cents.
    #[serde(default)]
    pub scale: i64,
}

impl Currency {
    pub fn new(id: i64, name: &str, symbol: &str, scale: i64) -> Self {
        Self {
            id: ResourceId::new(id),
            name: name.to_string(),
            symbol: symbol.to_string(),
            scale,
        }
    }

    pub fn sample_data() -> Vec<Currency> {
        vec![
            Currency::new(1, "US dollar", "USD", 100),
            Currency::new(2, "Euro", "EUR", 100),
            Currency::new(3, "Japanese yen", "JPY", 1),
        ]
    }
}

impl Record for Currency {
    const TABLE: &'static str = "currency";
    const NAME: &'static str = "Currency";

    fn id(&self) -> ResourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}
