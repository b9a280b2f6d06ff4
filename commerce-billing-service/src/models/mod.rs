pub mod cash_flow;
pub mod pagination;
pub mod party;
pub mod purchase;
pub mod purchase_return;
pub mod quotation;
pub mod sale;
pub mod sale_return;

pub use cash_flow::{CashEntry, CashFlowSummary, CashSource, TopSellingItem};
pub use pagination::{fetch_limit, project, split_page, validate_select, Selectable};
pub use party::{escape_like, ListPartiesFilter, Party, PartyInput};
pub use purchase::{ListInvoicesFilter, PaymentType, Purchase, PurchaseItem};
pub use purchase_return::{ListReturnsFilter, PurchaseReturn, PurchaseReturnItem};
pub use quotation::{ListQuotationsFilter, Quotation, QuotationItem};
pub use sale::{Sale, SaleItem};
pub use sale_return::{SaleReturn, SaleReturnItem};
