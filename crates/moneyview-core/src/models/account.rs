use serde::{Deserialize, Serialize};

use super::Record;
use crate::id::ResourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Open,
    Closed,
}

impl AccountStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            AccountStatus::Open => "Open",
            AccountStatus::Closed => "Closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub currency_id: ResourceId,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default)]
    pub favorite: bool,
}

impl Account {
    pub fn new(id: i64, name: &str, currency_id: i64) -> Self {
        Self {
            id: ResourceId::new(id),
            name: name.to_string(),
            currency_id: ResourceId::new(currency_id),
            status: AccountStatus::Open,
            favorite: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == AccountStatus::Open
    }

    pub fn sample_data() -> Vec<Account> {
        let mut rows = vec![
            Account::new(1, "Checking", 1),
            Account::new(2, "Savings", 1),
            Account::new(3, "Travel card", 2),
            Account::new(4, "Old brokerage", 1),
        ];
        rows[0].favorite = true;
        rows[3].status = AccountStatus::Closed;
        rows
    }
}

impl Record for Account {
    const TABLE: &'static str = "account";
    const NAME: &'static str = "Account";

    fn id(&self) -> ResourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}
