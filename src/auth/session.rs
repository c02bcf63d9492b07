//! Keeps the native session in step with token authentication.

use tower_sessions::Session;
use tracing::info;

use crate::db::User;

pub const SESSION_USER_KEY: &str = "user_id";

/// Set on sessions created from a token rather than a same-site form, so
/// form protection can tell the two apart.
pub const SESSION_TOKEN_BRIDGED_KEY: &str = "token_bridged";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// The session already belonged to this user.
    Unchanged,
    Established,
    /// The session belonged to someone else and was replaced.
    Replaced { previous_user_id: i32 },
}

pub struct SessionBridge;

impl SessionBridge {
    pub async fn current_user_id(session: &Session) -> Result<Option<i32>, tower_sessions::session::Error> {
        session.get::<i32>(SESSION_USER_KEY).await
    }

    /// Make `session` authenticate `user`. Idempotent for the same user; a
    /// session held by another user is cleared and given a fresh id first.
    pub async fn establish(
        session: &Session,
        user: &User,
        token_bridged: bool,
    ) -> Result<BridgeOutcome, tower_sessions::session::Error> {
        let current = Self::current_user_id(session).await?;

        let outcome = match current {
            Some(id) if id == user.id => return Ok(BridgeOutcome::Unchanged),
            Some(previous_user_id) => {
                info!(previous_user_id, user_id = user.id, "Replacing session of another user");
                session.clear().await;
                BridgeOutcome::Replaced { previous_user_id }
            }
            None => BridgeOutcome::Established,
        };

        session.cycle_id().await?;
        session.insert(SESSION_USER_KEY, user.id).await?;
        session
            .insert(SESSION_TOKEN_BRIDGED_KEY, token_bridged)
            .await?;

        Ok(outcome)
    }

    /// End the session entirely; the session layer expires `sessionid`.
    pub async fn terminate(session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.flush().await
    }
}
