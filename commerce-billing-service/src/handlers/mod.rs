pub mod health;
pub mod party;
pub mod purchase;
pub mod purchase_return;
pub mod quotation;
pub mod sale;
pub mod sale_return;
pub mod summary;
