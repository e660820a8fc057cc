//! Signed short-lived remix tokens.
//!
//! A remix intent is stateless: `<battle_id>.<expiry_unix>.<signature>`
//! where the signature is `sha256(secret || battle_id || expiry)` in hex.
//! The token authorizes starting a remix of one specific battle for a
//! few minutes; it carries no user identity.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Remix tokens live for 15 minutes.
const REMIX_TOKEN_TTL_MINUTES: i64 = 15;

fn signature(secret: &str, battle_id: Uuid, expires_unix: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(battle_id.as_bytes());
    hasher.update(expires_unix.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Issue a remix token for `battle_id`, valid from `now`.
pub fn issue(secret: &str, battle_id: Uuid, now: DateTime<Utc>) -> (String, DateTime<Utc>) {
    let expires_at = now + Duration::minutes(REMIX_TOKEN_TTL_MINUTES);
    let expires_unix = expires_at.timestamp();
    let token = format!(
        "{battle_id}.{expires_unix}.{sig}",
        sig = signature(secret, battle_id, expires_unix)
    );
    (token, expires_at)
}

/// Verify a remix token. Returns the battle id it authorizes.
pub fn verify(secret: &str, token: &str, now: DateTime<Utc>) -> Option<Uuid> {
    let mut parts = token.splitn(3, '.');
    let battle_id: Uuid = parts.next()?.parse().ok()?;
    let expires_unix: i64 = parts.next()?.parse().ok()?;
    let sig = parts.next()?;

    if now.timestamp() > expires_unix {
        return None;
    }
    if signature(secret, battle_id, expires_unix) != sig {
        return None;
    }
    Some(battle_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn issue_then_verify() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        let battle_id = Uuid::new_v4();
        let (token, expires_at) = issue(SECRET, battle_id, now);
        assert_eq!(expires_at, now + Duration::minutes(15));
        assert_eq!(verify(SECRET, &token, now), Some(battle_id));
    }

    #[test]
    fn expired_token_rejected() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        let battle_id = Uuid::new_v4();
        let (token, _) = issue(SECRET, battle_id, now);
        let later = now + Duration::minutes(16);
        assert_eq!(verify(SECRET, &token, later), None);
    }

    #[test]
    fn tampered_token_rejected() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        let (token, _) = issue(SECRET, Uuid::new_v4(), now);
        let other_battle = Uuid::new_v4();
        let forged = format!(
            "{other_battle}.{}",
            token.splitn(2, '.').nth(1).unwrap()
        );
        assert_eq!(verify(SECRET, &forged, now), None);
    }

    #[test]
    fn wrong_secret_rejected() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        let battle_id = Uuid::new_v4();
        let (token, _) = issue(SECRET, battle_id, now);
        assert_eq!(verify("another-secret-value", &token, now), None);
    }
}
