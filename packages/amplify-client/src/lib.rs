//! Thin Amplify backend client.
//!
//! Two surfaces, both driven by a Cognito id token the caller has already
//! obtained:
//!
//! - [`GraphQLClient`]: AppSync operations over the Observation/Media schema.
//! - [`StorageClient`]: object upload/existence/delete against the storage
//!   gateway, plus pure URL derivation.

pub mod error;
pub mod graphql;
pub mod storage;
pub mod types;

pub use error::{AmplifyError, Result};
pub use graphql::GraphQLClient;
pub use storage::StorageClient;
pub use types::{Media, MediaType, Observation};
