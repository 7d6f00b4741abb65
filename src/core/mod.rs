pub mod cache;
pub mod commit;
pub mod drop;
pub mod reminder;
pub mod session;
pub mod subtasks;
