use serde::{Deserialize, Serialize};

use saldo_types::{account::AccountValues, primitives::AccountId};

use crate::query::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountByCodeCursor {
    pub code: String,
    pub id: AccountId,
}

impl From<&AccountValues> for AccountByCodeCursor {
    fn from(values: &AccountValues) -> Self {
        Self {
            code: values.code.clone(),
            id: values.id,
        }
    }
}

impl Default for PaginatedQueryArgs<AccountByCodeCursor> {
    fn default() -> Self {
        Self {
            first: 100,
            after: None,
        }
    }
}
