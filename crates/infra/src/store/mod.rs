//! `IdentityStore` implementations.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryIdentityStore;
pub use postgres::PostgresIdentityStore;

use std::collections::HashSet;

use identra_auth::{Claim, ClaimType, NewUser, PasswordPolicy};

/// Problems with a registration, one description each.
pub(crate) fn registration_errors(new_user: &NewUser, policy: &PasswordPolicy) -> Vec<String> {
    let mut errors = Vec::new();
    let email = new_user.email.trim();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty() && !domain.contains('@'));
    if !well_formed {
        errors.push(format!("Email '{email}' is invalid."));
    }
    errors.extend(policy.validate(new_user.password()));
    errors
}

pub(crate) fn duplicate_email_error(email: &str) -> String {
    format!("Email '{}' is already taken.", email.trim())
}

/// Problems with attaching `incoming` to a user that already carries
/// `existing`. Keeps the one-claim-per-type invariant; empty values are
/// stored as given.
pub(crate) fn claim_errors(existing: &[Claim], incoming: &[Claim]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen: HashSet<ClaimType> = existing.iter().map(|c| c.claim_type).collect();

    for claim in incoming {
        if !seen.insert(claim.claim_type) {
            errors.push(format!("User already has a '{}' claim.", claim.claim_type));
        }
    }

    errors
}

/// Order claims the way claim sets are composed.
pub(crate) fn sort_claims(claims: &mut [Claim]) {
    claims.sort_by_key(|c| ClaimType::ALL.iter().position(|t| *t == c.claim_type));
}

#[cfg(test)]
mod tests {
    use super::*;
    use identra_auth::Policy;

    #[test]
    fn malformed_email_and_weak_password_are_reported_together() {
        let errors = registration_errors(
            &NewUser::new("not-an-email", "X", "abc"),
            &PasswordPolicy::default(),
        );
        assert_eq!(errors[0], "Email 'not-an-email' is invalid.");
        assert!(errors.len() > 1);
    }

    #[test]
    fn duplicate_claim_types_are_rejected() {
        let existing = Policy::User.claims_for("a@x.com", "A");
        let errors = claim_errors(&existing, &[Claim::new(ClaimType::Role, "Admin")]);
        assert_eq!(errors, vec!["User already has a 'role' claim.".to_string()]);

        let batch = [Claim::flag(ClaimType::Read, true), Claim::flag(ClaimType::Read, false)];
        assert_eq!(claim_errors(&[], &batch).len(), 1);
    }

    #[test]
    fn empty_values_are_accepted() {
        let claims = Policy::Manager.claims_for("a@x.com", "");
        assert!(claim_errors(&[], &claims).is_empty());
        assert!(claim_errors(&[], &[Claim::new(ClaimType::Role, "  ")]).is_empty());
    }

    #[test]
    fn sorting_restores_composition_order() {
        let mut claims = Policy::Admin.claims_for("a@x.com", "A");
        claims.reverse();
        sort_claims(&mut claims);
        assert_eq!(claims, Policy::Admin.claims_for("a@x.com", "A"));
    }
}
