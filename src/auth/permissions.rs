//! Role checks shared by the handlers.

use crate::error::AppError;
use crate::models::User;

pub fn require_staff(user: &User) -> Result<(), AppError> {
    if user.is_staff {
        Ok(())
    } else {
        Err(AppError::permission_denied())
    }
}

/// Object-level write check: staff, or the user the object belongs to.
pub fn staff_or_owner(user: &User, owner_id: i64) -> Result<(), AppError> {
    if user.is_staff || user.id == owner_id {
        Ok(())
    } else {
        Err(AppError::permission_denied())
    }
}
