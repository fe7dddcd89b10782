// src/policy.rs
//
// Role-gated operation matrix. Anonymous callers never reach this layer; the
// auth middleware already answered 401 when no identity could be derived.

use crate::errors::DomainError;
use crate::models::user::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ReadDao,
    CreateDao,
    UpdateDaoFields,
    UpdateTask,
    /// Adding, deleting or renaming a task.
    ManageTaskStructure,
    DeleteDao,
    /// Listing, creating and deactivating users.
    ManageUsers,
    UpdateOwnProfile,
    ReadComments,
    WriteComment,
}

pub fn is_allowed(role: UserRole, action: Action) -> bool {
    match action {
        Action::ReadDao
        | Action::UpdateDaoFields
        | Action::UpdateTask
        | Action::UpdateOwnProfile
        | Action::ReadComments
        | Action::WriteComment => true,
        Action::CreateDao
        | Action::ManageTaskStructure
        | Action::DeleteDao
        | Action::ManageUsers => role == UserRole::Admin,
    }
}

pub fn authorize(role: UserRole, action: Action) -> Result<(), DomainError> {
    if is_allowed(role, action) {
        Ok(())
    } else {
        Err(DomainError::Forbidden(
            "administrator role required".to_string(),
        ))
    }
}

/// Comments are editable and deletable by their author, or by an admin.
pub fn can_modify_comment(role: UserRole, actor_id: &str, author_id: &str) -> bool {
    role == UserRole::Admin || actor_id == author_id
}

/// No account may deactivate itself, admins included.
pub fn check_deactivation(actor_id: &str, target_id: &str) -> Result<(), DomainError> {
    if actor_id == target_id {
        return Err(DomainError::Forbidden(
            "cannot deactivate own account".to_string(),
        ));
    }
    Ok(())
}
