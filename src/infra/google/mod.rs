// Google API infra layer.
// - `auth.rs` exchanges service-account credentials for bearer tokens.
// - `drive_client.rs` walks Drive folders and lists documents.
// - `docs_client.rs` fetches document bodies.

#[path = "auth.rs"]
pub mod auth;

#[path = "drive_client.rs"]
pub mod drive_client;

#[path = "docs_client.rs"]
pub mod docs_client;

pub use auth::ServiceAccountAuth;
pub use docs_client::GoogleDocsClient;
pub use drive_client::GoogleDriveClient;
