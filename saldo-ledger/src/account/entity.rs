use derive_builder::Builder;
use rust_decimal::Decimal;

pub use saldo_types::{account::*, primitives::AccountId};

use crate::primitives::*;

/// A node of the chart of accounts. The cached `balance` is maintained by the
/// balance synchronization and reconciliation procedures only.
#[derive(Debug, Clone)]
pub struct Account {
    values: AccountValues,
}

impl Account {
    pub(super) fn new(values: AccountValues) -> Self {
        Self { values }
    }

    pub fn id(&self) -> AccountId {
        self.values.id
    }

    pub fn code(&self) -> &str {
        &self.values.code
    }

    pub fn account_type(&self) -> AccountType {
        self.values.account_type
    }

    pub fn balance(&self) -> Decimal {
        self.values.balance
    }

    pub fn values(&self) -> &AccountValues {
        &self.values
    }

    pub fn into_values(self) -> AccountValues {
        self.values
    }

    /// Applies the update and returns the names of the fields that changed.
    pub(super) fn update(
        &mut self,
        builder: impl Into<AccountUpdate>,
    ) -> Result<Vec<&'static str>, AccountUpdateError> {
        let AccountUpdateValues {
            name,
            description,
            category,
            is_active,
        } = builder.into().build()?;

        let mut updated_fields = Vec::new();
        if let Some(name) = name {
            if name != self.values.name {
                self.values.name = name;
                updated_fields.push("name");
            }
        }
        if let Some(description) = description {
            if Some(&description) != self.values.description.as_ref() {
                self.values.description = Some(description);
                updated_fields.push("description");
            }
        }
        if let Some(category) = category {
            if category != self.values.category {
                self.values.category = category;
                updated_fields.push("category");
            }
        }
        if let Some(is_active) = is_active {
            if is_active != self.values.is_active {
                self.values.is_active = is_active;
                updated_fields.push("is_active");
            }
        }
        Ok(updated_fields)
    }
}

impl From<Account> for AccountValues {
    fn from(account: Account) -> Self {
        account.values
    }
}

#[derive(Debug, Builder, Default)]
#[builder(name = "AccountUpdate", default)]
pub struct AccountUpdateValues {
    #[builder(setter(strip_option, into))]
    pub name: Option<String>,
    #[builder(setter(strip_option, into))]
    pub description: Option<String>,
    #[builder(setter(strip_option))]
    pub category: Option<AccountCategory>,
    #[builder(setter(strip_option))]
    pub is_active: Option<bool>,
}

/// Representation of a ***new*** account with required/optional properties and a builder.
#[derive(Builder, Debug, Clone)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct NewAccount {
    #[builder(setter(into), default = "AccountId::new()")]
    pub id: AccountId,
    #[builder(setter(into))]
    pub(super) code: String,
    #[builder(setter(into))]
    pub(super) name: String,
    #[builder(setter(strip_option, into), default)]
    pub(super) description: Option<String>,
    pub(super) account_type: AccountType,
    #[builder(setter(strip_option), default)]
    pub(super) category: Option<AccountCategory>,
    #[builder(setter(strip_option, into), default)]
    pub(super) parent_id: Option<AccountId>,
    #[builder(default)]
    pub(super) is_header: bool,
    #[builder(default = "true")]
    pub(super) is_active: bool,
}

impl NewAccount {
    pub fn builder() -> NewAccountBuilder {
        NewAccountBuilder::default()
    }

    pub fn category(&self) -> AccountCategory {
        self.category
            .unwrap_or_else(|| AccountCategory::default_for(self.account_type))
    }
}

impl NewAccountBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(code) = &self.code {
            if code.trim().is_empty() {
                return Err("Account code must not be empty".to_string());
            }
        }
        if let (Some(Some(category)), Some(account_type)) = (self.category, self.account_type) {
            if !category.belongs_to(account_type) {
                return Err(format!(
                    "Category {category} does not belong to account type {account_type}"
                ));
            }
        }
        Ok(())
    }
}
