//! Authentication infrastructure: password hashing and user persistence

pub mod password_hasher;
pub mod user_repository;

pub use password_hasher::PasswordHasher;
pub use user_repository::{InMemoryUserRepository, RedisUserRepository};
