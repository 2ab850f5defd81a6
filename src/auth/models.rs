//! Authentication Models

use crate::database::models::User;

/// The authenticated identity injected into request extensions by the token
/// middleware: the resolved user record plus the raw token string the request
/// presented (refresh and logout need it to locate the exact list entry).
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}
