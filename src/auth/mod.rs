//! Authentication module: value objects, providers and their registry

pub mod anonymous;
pub mod provider;
pub mod registry;
pub mod static_credentials;
pub mod token;
pub mod user;

pub use anonymous::AnonymousProvider;
pub use provider::{AuthProvider, AuthSession, Credentials, SharedProvider};
pub use registry::ProviderRegistry;
pub use static_credentials::StaticCredentialsProvider;
pub use token::Token;
pub use user::{basic_user_decoder, BasicUser, SharedUser, User, UserDecoder};
