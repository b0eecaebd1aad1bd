// Adapters layer: concrete implementations for external systems.

pub mod credentials;
pub mod firebase;

pub use credentials::Credentials;
pub use firebase::FirebaseStore;
