pub mod comment;
pub mod dao;
pub mod user;

pub use comment::Comment;
pub use dao::{Dao, Task, TaskDraft, TeamMember, TeamRole};
pub use user::{User, UserInfo, UserRole};
