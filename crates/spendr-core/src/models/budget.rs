// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Decimal fields arrive as JSON strings ("12.50") from the API but may be
/// plain numbers in hand-written payloads; accept both.
fn de_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(n) => Ok(n),
        Amount::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn de_opt_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "de_amount")] f64);

    Option::<Wrapper>::deserialize(deserializer).map(|w| w.map(|Wrapper(n)| n))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Income => "income",
            CategoryKind::Expense => "expense",
        }
    }
}

/// Kind of account a wallet represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletType {
    Cash,
    Bank,
    #[serde(rename = "eWallet")]
    EWallet,
    #[serde(rename = "Credit Card")]
    CreditCard,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default, deserialize_with = "de_amount")]
    pub balance: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub description: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<WalletType>,
    /// Display glyph, usually an emoji
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_currency() -> String {
    "PHP".to_string()
}

impl Wallet {
    pub fn balance_display(&self) -> String {
        format!("{} {:.2}", self.currency, self.balance)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de_opt_amount", skip_serializing_if = "Option::is_none")]
    pub monthly_budget: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "de_amount")]
    pub amount: f64,
    pub transaction_type: CategoryKind,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub wallet: i64,
    #[serde(default, skip_serializing)]
    pub wallet_name: Option<String>,
    pub category: Option<i64>,
    #[serde(default, skip_serializing)]
    pub category_name: Option<String>,
}

impl Transaction {
    /// Signed amount as shown in listings: income positive, expense negative
    pub fn signed_amount(&self) -> f64 {
        match self.transaction_type {
            CategoryKind::Income => self.amount,
            CategoryKind::Expense => -self.amount,
        }
    }
}

/// Query filters accepted by the transaction list endpoint.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub wallet_id: Option<i64>,
    pub category_id: Option<i64>,
    pub kind: Option<CategoryKind>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl TransactionFilter {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(id) = self.wallet_id {
            query.push(("wallet_id".to_string(), id.to_string()));
        }
        if let Some(id) = self.category_id {
            query.push(("category_id".to_string(), id.to_string()));
        }
        if let Some(kind) = self.kind {
            query.push(("type".to_string(), kind.as_str().to_string()));
        }
        if let Some(date) = self.start_date {
            query.push(("start_date".to_string(), date.format("%Y-%m-%d").to_string()));
        }
        if let Some(date) = self.end_date {
            query.push(("end_date".to_string(), date.format("%Y-%m-%d").to_string()));
        }
        query
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetGoal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub month: u8,
    pub year: u16,
    pub category: Option<i64>,
    #[serde(default, skip_serializing)]
    pub category_name: Option<String>,
    #[serde(deserialize_with = "de_amount")]
    pub amount: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringBill {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(deserialize_with = "de_amount")]
    pub amount: f64,
    pub due_day: u8,
    pub category: Option<i64>,
    #[serde(default, skip_serializing)]
    pub category_name: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub notes: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingByCategory {
    pub category_id: Option<i64>,
    pub category_name: String,
    #[serde(deserialize_with = "de_amount")]
    pub total_amount: f64,
}

/// Income and expense totals for one month (`YYYY-MM`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyTrend {
    pub month: String,
    #[serde(default, deserialize_with = "de_amount")]
    pub income: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub expense: f64,
}

impl MonthlyTrend {
    pub fn net(&self) -> f64 {
        self.income - self.expense
    }
}

/// Move money between two of the user's wallets.
#[derive(Debug, Clone, Serialize)]
pub struct FundsTransfer {
    pub from_wallet: i64,
    pub to_wallet: i64,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Server acknowledgement of a transfer with both resulting balances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    #[serde(default)]
    pub message: String,
    #[serde(deserialize_with = "de_amount")]
    pub from_wallet_new_balance: f64,
    #[serde(deserialize_with = "de_amount")]
    pub to_wallet_new_balance: f64,
}

/// Subset of the dashboard aggregate the client displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    #[serde(deserialize_with = "de_amount")]
    pub total_balance: f64,
    #[serde(deserialize_with = "de_amount")]
    pub income_this_month: f64,
    #[serde(deserialize_with = "de_amount")]
    pub expense_this_month: f64,
    #[serde(default, deserialize_with = "de_amount")]
    pub net_balance_this_month: f64,
    #[serde(default)]
    pub spending_by_category: Vec<SpendingByCategory>,
    #[serde(default)]
    pub wallets: Vec<Wallet>,
    #[serde(default)]
    pub current_month_str: Option<String>,
    #[serde(default)]
    pub alerts: Vec<String>,
}
