pub mod entry;
pub mod movie;
pub mod person;
pub mod rating;
