//! Domain models for the Savers site.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod category;
pub mod product;
pub mod session;
pub mod user;

pub use category::{Category, CategoryInput};
pub use product::{Product, ProductInput};
pub use session::{AuthSession, NewSession, Session, ViewerView};
pub use user::{NewUser, User, UserPage, UserQuery};
