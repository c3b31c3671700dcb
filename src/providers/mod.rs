pub mod vtu_provider;
pub mod http_vtu;

pub use vtu_provider::{ ProviderReceipt, ProviderStatus, PurchaseRequest, VtuProvider };
pub use http_vtu::HttpVtuProvider;
