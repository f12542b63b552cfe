//! Data models for spendr entities.
//!
//! This module contains the data structures exchanged with the spendr API:
//!
//! - `TokenPair`, `UserProfile`: session credentials and the signed-in user
//! - Budget types: `Wallet`, `Category`, `Transaction`, `BudgetGoal`,
//!   `RecurringBill`, `DashboardSummary`, `MonthlyTrend`, transfers

pub mod budget;
pub mod user;

pub use budget::{
    BudgetGoal, Category, CategoryKind, DashboardSummary, FundsTransfer, MonthlyTrend,
    RecurringBill, SpendingByCategory, Transaction, TransactionFilter, TransferReceipt, Wallet,
    WalletType,
};
pub use user::{TokenPair, UserProfile};
