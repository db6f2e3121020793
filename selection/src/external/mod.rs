//! External service integrations

pub mod odoo;
pub mod remote;

pub use odoo::OdooRpcClient;
pub use remote::RemoteDataService;
