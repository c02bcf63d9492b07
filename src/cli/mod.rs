//! Operator command line.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::entities::users::Role;

/// Helpdesk - token authentication service for the support desk
#[derive(Parser, Debug)]
#[command(name = "helpdesk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the default search path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the web server until Ctrl+C
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Inspect and clean up API tokens
    Tokens {
        #[command(subcommand)]
        command: TokensCommands,
    },

    /// Manage accounts and roles
    Users {
        #[command(subcommand)]
        command: UsersCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum TokensCommands {
    /// List tokens, newest first
    #[command(alias = "ls")]
    List {
        /// Only show tokens of this user
        #[arg(long)]
        user: Option<String>,
    },

    /// Delete expired and/or idle tokens
    Sweep {
        /// Remove tokens past their expiry
        #[arg(long)]
        expired: bool,
        /// Remove tokens unused for this many days
        #[arg(long)]
        idle_days: Option<u32>,
    },

    /// Revoke every token of a user
    #[command(alias = "rm")]
    Revoke {
        username: String,
    },

    /// Give every user without a legacy token one
    IssueLegacy,
}

#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// Create an administrator account
    CreateAdmin {
        username: String,
        email: String,
        #[arg(long, env = "HELPDESK_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Restore the admin role together with the staff and superuser flags
    FixAdminRole {
        username: String,
    },

    /// Change a user's role
    SetRole {
        username: String,
        role: Role,
    },
}

pub use commands::*;

impl Cli {
    /// Configuration named by `--config`, or the first file on the search path.
    pub fn load_config(&self) -> anyhow::Result<crate::Config> {
        match &self.config {
            Some(path) => crate::Config::load_from_path(path),
            None => crate::Config::load(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_token_sweep_flags() {
        let cli = Cli::parse_from(["helpdesk", "tokens", "sweep", "--expired", "--idle-days", "30"]);
        match cli.command {
            Some(Commands::Tokens {
                command: TokensCommands::Sweep { expired, idle_days },
            }) => {
                assert!(expired);
                assert_eq!(idle_days, Some(30));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_role_names() {
        let cli = Cli::parse_from(["helpdesk", "users", "set-role", "alice", "Support"]);
        match cli.command {
            Some(Commands::Users {
                command: UsersCommands::SetRole { username, role },
            }) => {
                assert_eq!(username, "alice");
                assert_eq!(role, Role::Support);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_roles() {
        assert!(Cli::try_parse_from(["helpdesk", "users", "set-role", "alice", "root"]).is_err());
    }

    #[test]
    fn admin_password_comes_from_flag() {
        let cli = Cli::parse_from([
            "helpdesk",
            "users",
            "create-admin",
            "root",
            "root@example.com",
            "--password",
            "S3cure!pass",
        ]);
        match cli.command {
            Some(Commands::Users {
                command: UsersCommands::CreateAdmin { password, .. },
            }) => assert_eq!(password, "S3cure!pass"),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
