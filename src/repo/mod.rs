//! Repository functions, one module per entity. Every function takes the
//! open connection and performs a single synchronous statement group.

pub mod periods;
pub mod reference;
pub mod settings;
pub mod teachers;
pub mod works;

pub fn now_stamp() -> String {
    chrono::Local::now().to_rfc3339()
}

pub fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}
