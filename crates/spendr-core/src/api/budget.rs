//! Budget resource endpoints.
//!
//! Thin fetch-and-decode wrappers; every call goes through the session guard.

use super::request::ApiRequest;
use super::{ApiClient, ApiError};
use crate::models::{
    BudgetGoal, Category, DashboardSummary, FundsTransfer, MonthlyTrend, RecurringBill,
    Transaction, TransactionFilter, TransferReceipt, Wallet,
};

const WALLETS: &str = "budget/wallets/";
const CATEGORIES: &str = "budget/categories/";
const TRANSACTIONS: &str = "budget/transactions/";
const BUDGET_GOALS: &str = "budget/budget-goals/";
const RECURRING_BILLS: &str = "budget/recurring-bills/";
const DASHBOARD_SUMMARY: &str = "budget/dashboard-summary/";
const MONTHLY_SUMMARY: &str = "budget/monthly-summary/";
const TRANSFERS: &str = "budget/transfers/";

fn detail(collection: &str, id: i64) -> String {
    format!("{}{}/", collection, id)
}

#[derive(Clone)]
pub struct BudgetApi {
    api: ApiClient,
}

impl BudgetApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    // ===== Wallets =====

    pub async fn wallets(&self) -> Result<Vec<Wallet>, ApiError> {
        self.api.get(WALLETS).await
    }

    pub async fn create_wallet(&self, wallet: &Wallet) -> Result<Wallet, ApiError> {
        self.api.post(WALLETS, wallet).await
    }

    pub async fn update_wallet(&self, id: i64, wallet: &Wallet) -> Result<Wallet, ApiError> {
        self.api.put(&detail(WALLETS, id), wallet).await
    }

    pub async fn delete_wallet(&self, id: i64) -> Result<(), ApiError> {
        self.api.delete(&detail(WALLETS, id)).await
    }

    /// Move funds between two wallets. Obviously invalid transfers are
    /// rejected locally; the server still checks ownership and balance.
    pub async fn transfer_funds(&self, transfer: &FundsTransfer) -> Result<TransferReceipt, ApiError> {
        if transfer.from_wallet == transfer.to_wallet {
            return Err(ApiError::InvalidRequest(
                "Cannot transfer funds to the same wallet".to_string(),
            ));
        }
        if transfer.amount.is_nan() || transfer.amount <= 0.0 {
            return Err(ApiError::InvalidRequest("Amount must be positive".to_string()));
        }
        self.api.post(TRANSFERS, transfer).await
    }

    // ===== Categories =====

    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        self.api.get(CATEGORIES).await
    }

    pub async fn create_category(&self, category: &Category) -> Result<Category, ApiError> {
        self.api.post(CATEGORIES, category).await
    }

    pub async fn update_category(&self, id: i64, category: &Category) -> Result<Category, ApiError> {
        self.api.put(&detail(CATEGORIES, id), category).await
    }

    pub async fn delete_category(&self, id: i64) -> Result<(), ApiError> {
        self.api.delete(&detail(CATEGORIES, id)).await
    }

    // ===== Transactions =====

    pub async fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, ApiError> {
        let request = ApiRequest::get(TRANSACTIONS).query(filter.to_query());
        self.api.execute_json(&request).await
    }

    pub async fn create_transaction(&self, transaction: &Transaction) -> Result<Transaction, ApiError> {
        self.api.post(TRANSACTIONS, transaction).await
    }

    pub async fn update_transaction(
        &self,
        id: i64,
        transaction: &Transaction,
    ) -> Result<Transaction, ApiError> {
        self.api.put(&detail(TRANSACTIONS, id), transaction).await
    }

    pub async fn delete_transaction(&self, id: i64) -> Result<(), ApiError> {
        self.api.delete(&detail(TRANSACTIONS, id)).await
    }

    // ===== Budget goals =====

    pub async fn budget_goals(&self) -> Result<Vec<BudgetGoal>, ApiError> {
        self.api.get(BUDGET_GOALS).await
    }

    pub async fn create_budget_goal(&self, goal: &BudgetGoal) -> Result<BudgetGoal, ApiError> {
        self.api.post(BUDGET_GOALS, goal).await
    }

    pub async fn update_budget_goal(&self, id: i64, goal: &BudgetGoal) -> Result<BudgetGoal, ApiError> {
        self.api.put(&detail(BUDGET_GOALS, id), goal).await
    }

    pub async fn delete_budget_goal(&self, id: i64) -> Result<(), ApiError> {
        self.api.delete(&detail(BUDGET_GOALS, id)).await
    }

    // ===== Recurring bills =====

    pub async fn recurring_bills(&self) -> Result<Vec<RecurringBill>, ApiError> {
        self.api.get(RECURRING_BILLS).await
    }

    pub async fn create_recurring_bill(&self, bill: &RecurringBill) -> Result<RecurringBill, ApiError> {
        self.api.post(RECURRING_BILLS, bill).await
    }

    pub async fn update_recurring_bill(
        &self,
        id: i64,
        bill: &RecurringBill,
    ) -> Result<RecurringBill, ApiError> {
        self.api.put(&detail(RECURRING_BILLS, id), bill).await
    }

    pub async fn delete_recurring_bill(&self, id: i64) -> Result<(), ApiError> {
        self.api.delete(&detail(RECURRING_BILLS, id)).await
    }

    // ===== Dashboard =====

    pub async fn dashboard_summary(&self) -> Result<DashboardSummary, ApiError> {
        self.api.get(DASHBOARD_SUMMARY).await
    }

    /// Income/expense totals per month, oldest first.
    pub async fn monthly_summary(&self) -> Result<Vec<MonthlyTrend>, ApiError> {
        self.api.get(MONTHLY_SUMMARY).await
    }
}
