//! End-to-end lifecycle scenarios against the in-memory store.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use keyward::abuse::{FixedWindowLimiter, LockoutPolicy, NoopRateLimiter, WindowConfig};
use keyward::auth::{AuthError, AuthPolicy, AuthService, RegisterInput};
use keyward::rbac::{Permission, Role, RoleRegistry};
use keyward::store::{AuthStore, MemoryStore};
use keyward::token::{Claims, TokenIssuer};
use uuid::Uuid;

// Minimum bcrypt cost; keeps tests fast.
const TEST_COST: u32 = 4;

fn test_policy() -> AuthPolicy {
    AuthPolicy::new().with_password_cost(TEST_COST)
}

fn service_with(policy: AuthPolicy) -> (AuthService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = AuthService::new(
        store.clone(),
        TokenIssuer::new(b"integration-test-secret", policy.access_ttl_seconds()),
        RoleRegistry::default(),
        Arc::new(NoopRateLimiter),
        policy,
    );
    (service, store)
}

async fn register_user(service: &AuthService, name: &str) -> Result<Uuid, AuthError> {
    service
        .register(RegisterInput {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password: format!("{name}-password"),
            display_name: name.to_string(),
        })
        .await
}

async fn login_user(
    service: &AuthService,
    name: &str,
) -> Result<(keyward::auth::TokenPair, Claims), AuthError> {
    let pair = service
        .login(name, &format!("{name}-password"), None, "test-client")
        .await?;
    let claims = service.verify_access(&pair.access_token)?;
    Ok((pair, claims))
}

async fn make_admin(
    service: &AuthService,
    store: &Arc<MemoryStore>,
    name: &str,
) -> Result<Claims> {
    let id = register_user(service, name).await?;
    store.update_role(id, Role::Admin).await?;
    let (_, claims) = login_user(service, name).await?;
    Ok(claims)
}

#[tokio::test]
async fn register_login_verify_round_trip() -> Result<()> {
    let (service, _) = service_with(test_policy());

    let user_id = register_user(&service, "alice").await?;
    let (pair, claims) = login_user(&service, "alice").await?;

    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.role, Role::User);
    assert_eq!(pair.expires_in, test_policy().access_ttl_seconds());

    let permissions = service.permissions_of(&claims);
    assert!(permissions.contains(&Permission::AgentCreate));
    assert!(!permissions.contains(&Permission::RoleAssign));
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_conflicts() -> Result<()> {
    let (service, _) = service_with(test_policy());

    register_user(&service, "alice").await?;
    let err = register_user(&service, "alice").await.unwrap_err();
    assert!(matches!(err, AuthError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn login_with_email_works() -> Result<()> {
    let (service, _) = service_with(test_policy());

    register_user(&service, "alice").await?;
    let pair = service
        .login("alice@example.com", "alice-password", None, "test-client")
        .await?;
    assert!(service.verify_access(&pair.access_token).is_ok());
    Ok(())
}

#[tokio::test]
async fn login_accepts_any_email_casing() -> Result<()> {
    let (service, _) = service_with(test_policy());

    service
        .register(RegisterInput {
            username: "alice".to_string(),
            email: "Alice@Example.COM".to_string(),
            password: "alice-password".to_string(),
            display_name: "Alice".to_string(),
        })
        .await?;

    for login in ["Alice@Example.COM", "alice@example.com", " ALICE@EXAMPLE.com "] {
        let pair = service
            .login(login, "alice-password", None, "test-client")
            .await?;
        assert!(service.verify_access(&pair.access_token).is_ok());
    }
    Ok(())
}

#[tokio::test]
async fn repeated_failures_lock_the_account() -> Result<()> {
    let policy = test_policy().with_lockout(
        LockoutPolicy::new()
            .with_threshold(3)
            .with_duration_seconds(3600),
    );
    let (service, store) = service_with(policy);

    register_user(&service, "alice").await?;
    for _ in 0..3 {
        let err = service
            .login("alice", "wrong-password", None, "test-client")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    // Correct password is refused while locked.
    let err = service
        .login("alice", "alice-password", None, "test-client")
        .await
        .unwrap_err();
    let AuthError::AccountLocked {
        retry_after_seconds,
    } = err
    else {
        panic!("expected AccountLocked, got {err}");
    };
    assert!(retry_after_seconds > 0);

    // Admin force-unlock restores access immediately.
    let admin = make_admin(&service, &store, "root").await?;
    let (_, alice_claims) = {
        let alice = store
            .user_by_login("alice")
            .await?
            .expect("alice exists");
        service.force_unlock(&admin, alice.id).await?;
        login_user(&service, "alice").await?
    };
    assert_eq!(alice_claims.role, Role::User);
    Ok(())
}

#[tokio::test]
async fn lockout_expires_on_its_own() -> Result<()> {
    let policy = test_policy().with_lockout(
        LockoutPolicy::new()
            .with_threshold(1)
            .with_duration_seconds(1),
    );
    let (service, _) = service_with(policy);

    register_user(&service, "alice").await?;
    service
        .login("alice", "wrong-password", None, "test-client")
        .await
        .unwrap_err();
    assert!(matches!(
        service
            .login("alice", "alice-password", None, "test-client")
            .await
            .unwrap_err(),
        AuthError::AccountLocked { .. }
    ));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(service
        .login("alice", "alice-password", None, "test-client")
        .await
        .is_ok());
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_and_reuse_revokes_the_chain() -> Result<()> {
    let (service, _) = service_with(test_policy());

    register_user(&service, "alice").await?;
    let (first, _) = login_user(&service, "alice").await?;

    let second = service.refresh(&first.refresh_token, "test-client").await?;
    assert_ne!(second.refresh_token, first.refresh_token);

    // Replaying the rotated-away token is treated as theft.
    let err = service
        .refresh(&first.refresh_token, "test-client")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ReuseDetected));

    // The whole chain is now dead, including the legitimate successor.
    let err = service
        .refresh(&second.refresh_token, "test-client")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenRevoked));

    // Outstanding access tokens stay valid until they expire on their own.
    assert!(service.verify_access(&second.access_token).is_ok());
    Ok(())
}

#[tokio::test]
async fn concurrent_refresh_has_exactly_one_winner() -> Result<()> {
    let (service, _) = service_with(test_policy());

    register_user(&service, "alice").await?;
    let (pair, _) = login_user(&service, "alice").await?;

    let (left, right) = tokio::join!(
        service.refresh(&pair.refresh_token, "client-a"),
        service.refresh(&pair.refresh_token, "client-b"),
    );

    let mut winner = None;
    for result in [left, right] {
        match result {
            Ok(pair) => {
                assert!(winner.replace(pair).is_none(), "exactly one rotation must win");
            }
            Err(err) => assert!(matches!(err, AuthError::ReuseDetected)),
        }
    }

    // The double-submit revokes the chain no matter which side of the swap
    // the loser lands on, so the winner's fresh refresh token is dead too.
    let winner = winner.ok_or_else(|| anyhow::anyhow!("no rotation won"))?;
    let err = service
        .refresh(&winner.refresh_token, "client-a")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenRevoked));
    Ok(())
}

#[tokio::test]
async fn unknown_and_garbage_refresh_tokens_are_invalid() -> Result<()> {
    let (service, _) = service_with(test_policy());

    let err = service
        .refresh("no-such-token", "test-client")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenInvalid));
    Ok(())
}

#[tokio::test]
async fn logout_kills_the_minting_chain() -> Result<()> {
    let (service, _) = service_with(test_policy());

    register_user(&service, "alice").await?;
    let (pair, _) = login_user(&service, "alice").await?;

    service.logout(&pair.access_token).await?;
    let err = service
        .refresh(&pair.refresh_token, "test-client")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenRevoked));
    Ok(())
}

#[tokio::test]
async fn revoke_all_sessions_clears_every_chain() -> Result<()> {
    let (service, _) = service_with(test_policy());

    register_user(&service, "alice").await?;
    let (first, claims) = login_user(&service, "alice").await?;
    let (second, _) = login_user(&service, "alice").await?;

    let revoked = service.revoke_all_sessions(&claims, None).await?;
    assert!(revoked >= 2);

    for pair in [first, second] {
        let err = service
            .refresh(&pair.refresh_token, "test-client")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));
    }
    Ok(())
}

#[tokio::test]
async fn session_directory_lists_and_revokes() -> Result<()> {
    let (service, _) = service_with(test_policy());

    register_user(&service, "alice").await?;
    let (_, desktop) = login_user(&service, "alice").await?;
    let (_, laptop) = login_user(&service, "alice").await?;

    let sessions = service.list_sessions(&desktop).await?;
    assert_eq!(sessions.len(), 2);

    service.revoke_session(&desktop, laptop.sid).await?;
    let sessions = service.list_sessions(&desktop).await?;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].chain_id, desktop.sid);

    // A made-up chain id is indistinguishable from someone else's.
    let err = service
        .revoke_session(&desktop, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound));
    Ok(())
}

#[tokio::test]
async fn api_key_scopes_narrow_and_track_role_changes() -> Result<()> {
    let (service, store) = service_with(test_policy());

    register_user(&service, "alice").await?;
    let (_, claims) = login_user(&service, "alice").await?;

    let scopes: BTreeSet<_> = [Permission::AgentCreate, Permission::AgentRead]
        .into_iter()
        .collect();
    let (record, secret) = service.create_api_key(&claims, scopes.clone(), None).await?;
    assert_eq!(record.scopes, scopes);

    let (owner, effective) = service.authenticate_api_key(&secret).await?;
    assert_eq!(owner.username, "alice");
    assert_eq!(effective, scopes);

    // A role downgrade shrinks the outstanding key immediately.
    let admin = make_admin(&service, &store, "root").await?;
    service
        .change_user_role(&admin, claims.sub, Role::Guest)
        .await?;
    let (_, effective) = service.authenticate_api_key(&secret).await?;
    let expected: BTreeSet<_> = [Permission::AgentRead].into_iter().collect();
    assert_eq!(effective, expected);
    Ok(())
}

#[tokio::test]
async fn api_key_creation_respects_role_ceiling() -> Result<()> {
    let (service, _) = service_with(test_policy());

    register_user(&service, "alice").await?;
    let (_, claims) = login_user(&service, "alice").await?;

    // user role holds no user:delete, so the key may not either.
    let err = service
        .create_api_key(&claims, [Permission::UserDelete].into_iter().collect(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Forbidden));

    let err = service
        .create_api_key(&claims, BTreeSet::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn revoked_api_keys_stop_authenticating() -> Result<()> {
    let (service, _) = service_with(test_policy());

    register_user(&service, "alice").await?;
    let (_, claims) = login_user(&service, "alice").await?;

    let (record, secret) = service
        .create_api_key(&claims, [Permission::AgentRead].into_iter().collect(), None)
        .await?;
    service.revoke_api_key(&claims, record.id).await?;

    let err = service.authenticate_api_key(&secret).await.unwrap_err();
    assert!(matches!(err, AuthError::TokenRevoked));

    // Revoked keys drop out of the listing, and revoking again is a no-op.
    let keys = service.list_api_keys(&claims).await?;
    assert!(keys.is_empty());
    service.revoke_api_key(&claims, record.id).await?;
    Ok(())
}

#[tokio::test]
async fn role_change_takes_effect_on_next_token() -> Result<()> {
    let (service, store) = service_with(test_policy());

    register_user(&service, "alice").await?;
    let (_, old_claims) = login_user(&service, "alice").await?;
    let admin = make_admin(&service, &store, "root").await?;

    service
        .change_user_role(&admin, old_claims.sub, Role::Developer)
        .await?;

    // The outstanding token still carries the old role.
    assert!(!service.check_permission(&old_claims, Permission::UserRead));

    let (_, new_claims) = login_user(&service, "alice").await?;
    assert_eq!(new_claims.role, Role::Developer);
    assert!(service.check_permission(&new_claims, Permission::UserRead));
    Ok(())
}

#[tokio::test]
async fn role_changes_are_guarded() -> Result<()> {
    let (service, store) = service_with(test_policy());

    register_user(&service, "alice").await?;
    let (_, alice) = login_user(&service, "alice").await?;
    let admin = make_admin(&service, &store, "root").await?;

    // Nobody changes their own role, admin included.
    let err = service
        .change_user_role(&admin, admin.sub, Role::Guest)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Forbidden));

    // And a plain user cannot assign roles at all.
    let err = service
        .change_user_role(&alice, admin.sub, Role::Guest)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Forbidden));
    Ok(())
}

#[tokio::test]
async fn change_password_requires_the_old_one() -> Result<()> {
    let (service, _) = service_with(test_policy());

    register_user(&service, "alice").await?;
    let (_, claims) = login_user(&service, "alice").await?;

    let err = service
        .change_password(&claims, "wrong-old", "new-password-1")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));

    service
        .change_password(&claims, "alice-password", "new-password-1")
        .await?;

    assert!(matches!(
        service
            .login("alice", "alice-password", None, "test-client")
            .await
            .unwrap_err(),
        AuthError::InvalidCredentials
    ));
    assert!(service
        .login("alice", "new-password-1", None, "test-client")
        .await
        .is_ok());
    Ok(())
}

#[tokio::test]
async fn login_rate_limit_kicks_in() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let limiter = FixedWindowLimiter::new()
        .with_login(WindowConfig::new(2, Duration::from_secs(60)));
    let policy = test_policy();
    let service = AuthService::new(
        store,
        TokenIssuer::new(b"integration-test-secret", policy.access_ttl_seconds()),
        RoleRegistry::default(),
        Arc::new(limiter),
        policy,
    );

    register_user(&service, "alice").await?;
    for _ in 0..2 {
        service
            .login("alice", "alice-password", None, "10.0.0.1")
            .await?;
    }
    let err = service
        .login("alice", "alice-password", None, "10.0.0.1")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::RateLimited { .. }));

    // A different client is unaffected.
    assert!(service
        .login("alice", "alice-password", None, "10.0.0.2")
        .await
        .is_ok());
    Ok(())
}

#[tokio::test]
async fn admin_role_table_is_a_superset() -> Result<()> {
    let (service, store) = service_with(test_policy());
    let admin = make_admin(&service, &store, "root").await?;

    let table = service.list_roles(&admin)?;
    let admin_grant = table
        .iter()
        .find(|(role, _)| *role == Role::Admin)
        .map(|(_, grant)| grant.clone())
        .expect("admin entry");

    for (_, grant) in &table {
        assert!(grant.is_subset(&admin_grant));
    }

    // Plain users cannot read the table.
    register_user(&service, "alice").await?;
    let (_, alice) = login_user(&service, "alice").await?;
    assert!(matches!(
        service.list_roles(&alice).unwrap_err(),
        AuthError::Forbidden
    ));
    Ok(())
}
