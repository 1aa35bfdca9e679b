use std::collections::BTreeSet;

use crate::error::ValidationError;
use crate::id::RoleId;

/// Parse a comma-delimited role list (`"123, <@&456>,789"`) into a typed set.
///
/// Accepts bare snowflakes and role mentions. Empty segments are ignored so a
/// trailing comma is harmless.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidRoleId`] for the first segment that is
/// not a role identifier.
pub fn parse_role_list(input: &str) -> Result<BTreeSet<RoleId>, ValidationError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let raw = segment
                .strip_prefix("<@&")
                .and_then(|rest| rest.strip_suffix('>'))
                .unwrap_or(segment);
            raw.parse::<RoleId>()
                .map_err(|_| ValidationError::InvalidRoleId(segment.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_ids_and_mentions() {
        let roles = parse_role_list("1, <@&2>,3,").unwrap();
        let expected: BTreeSet<_> = [RoleId::new(1), RoleId::new(2), RoleId::new(3)].into();
        assert_eq!(roles, expected);
    }

    #[test]
    fn should_return_empty_set_for_blank_input() {
        assert!(parse_role_list("  ").unwrap().is_empty());
    }

    #[test]
    fn should_reject_role_names() {
        let err = parse_role_list("1, moderators").unwrap_err();
        assert_eq!(err, ValidationError::InvalidRoleId("moderators".into()));
    }
}
