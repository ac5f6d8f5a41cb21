pub mod db;
pub mod email;
pub mod password;

pub use db::DbAdapter;
pub use email::EmailAdapter;
pub use password::Argon2Credentials;
