use crate::error::GateError;

use super::principal::{Principal, Role};

/// Role gate: with no required roles any authenticated principal passes.
pub fn check_roles(principal: &Principal, required: &[Role], action: &str) -> Result<(), GateError> {
    if required.is_empty() || required.contains(&principal.role) {
        return Ok(());
    }
    Err(GateError::forbidden_role(principal.role.as_str(), action))
}

/// Ownership gate: the owner or an elevated role passes. A missing owner value never matches.
pub fn check_owner(principal: &Principal, owner: Option<&str>) -> Result<(), GateError> {
    if principal.role.is_elevated() || owner == Some(principal.id.as_str()) {
        Ok(())
    } else {
        Err(GateError::not_owner())
    }
}
