use crate::errors::ServiceError;
use kfm_cp_storage::OwnerScope;

/// Authenticated caller, resolved by the outer request layer from token
/// claims and passed explicitly into every scoped operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    pub username: String,
    pub org_id: String,
    /// Organisation members see every record of their organisation. Service
    /// accounts without an organisation only see what they own.
    pub filter_by_organisation: bool,
}

impl CallerIdentity {
    pub fn new(username: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            org_id: org_id.into(),
            filter_by_organisation: true,
        }
    }

    pub fn service_account(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            org_id: String::new(),
            filter_by_organisation: false,
        }
    }

    /// Visibility scope for this caller. An organisation filter with no
    /// organisation id falls back to owner matching.
    pub fn scope(&self) -> OwnerScope {
        if self.filter_by_organisation && !self.org_id.is_empty() {
            OwnerScope::Organisation(self.org_id.clone())
        } else {
            OwnerScope::Owner(self.username.clone())
        }
    }
}

/// Resolve the caller or fail with `Unauthenticated`.
pub fn authenticated(
    caller: Option<&CallerIdentity>,
) -> Result<&CallerIdentity, ServiceError> {
    match caller {
        Some(c) if !c.username.is_empty() => Ok(c),
        _ => Err(ServiceError::Unauthenticated(
            "user not authenticated".to_string(),
        )),
    }
}
