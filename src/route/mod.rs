pub mod dalle;
pub mod docs;
pub mod posts;
