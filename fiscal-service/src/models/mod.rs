pub mod document;
pub mod organization;
pub mod payment;
pub mod sale;

pub use document::{DocumentLine, DocumentStatus, DocumentType, FiscalDocument, UpsertFiscalDocument};
pub use organization::{OrgSettings, UpdateOrgSettings};
pub use payment::{CreatePayment, Payment, PaymentMethod, PaymentStatus, UpdatePayment};
pub use sale::{CreateSale, CreateSaleItem, Sale, SaleItem, SaleStatus};
