mod tokens;
mod users;

pub use tokens::{cmd_issue_legacy_tokens, cmd_list_tokens, cmd_revoke_tokens, cmd_sweep_tokens};
pub use users::{cmd_create_admin, cmd_fix_admin_role, cmd_set_role};

use crate::config::Config;
use crate::state::SharedState;

async fn open_state(config: &Config) -> anyhow::Result<SharedState> {
    SharedState::new(config.clone()).await
}
