pub mod issue;
pub mod page;
