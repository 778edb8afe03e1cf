// wa-relay: Google Sheets backend
//
// Module layout:
//   auth     ServiceAccountKey, ServiceAccountAuth (JWT → bearer), TokenProvider
//   sheets   GoogleSheetsGateway (SheetGateway over Sheets REST v4)

pub mod auth;
pub mod sheets;

pub use auth::{MissingCredentials, ServiceAccountAuth, ServiceAccountKey, StaticToken, TokenProvider};
pub use sheets::GoogleSheetsGateway;
