//! Sea-ORM entity definitions
//!
//! These map our domain models to database tables.

pub mod file;
pub mod location;
pub mod tag;
pub mod tag_on_file;

// Re-export all entities
pub use file::Entity as File;
pub use location::Entity as Location;
pub use tag::Entity as Tag;
pub use tag_on_file::Entity as TagOnFile;

// Re-export active models for easy access
pub use file::ActiveModel as FileActive;
pub use location::ActiveModel as LocationActive;
pub use tag::ActiveModel as TagActive;
pub use tag_on_file::ActiveModel as TagOnFileActive;
