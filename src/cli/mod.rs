//! CLI argument definitions for tds-servers.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// tds-servers - Manage TOTVS application server definitions.
///
/// Start with `tds-servers list` to see the configured servers, then
/// `tds-servers select <server>` to make one current.
#[derive(Parser, Debug)]
#[command(name = "tds-servers")]
#[command(author, version, about = "Manage TOTVS application server definitions", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if tds-servers was started in <path> instead of the current directory.
    /// Can also be set via TDS_WORKSPACE environment variable.
    #[arg(short = 'C', long = "workspace", global = true, env = "TDS_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Use <workspace>/.vscode/servers.json
    #[arg(long, global = true, conflicts_with = "global_config")]
    pub workspace_config: bool,

    /// Use ~/.totvsls/servers.json
    #[arg(long, global = true)]
    pub global_config: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Location preference given on the command line, if any.
    pub fn workspace_server_config(&self) -> Option<bool> {
        if self.workspace_config {
            Some(true)
        } else if self.global_config {
            Some(false)
        } else {
            None
        }
    }
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List configured servers
    List,

    /// Show a server by name or id
    Show {
        /// Server name or id
        server: String,
    },

    /// Add a server definition
    Add(AddArgs),

    /// Remove a server
    Remove {
        /// Server name or id
        server: String,
    },

    /// Rename a server
    Rename {
        /// Server name or id
        server: String,
        /// New display name
        new_name: String,
    },

    /// Change per-server paths
    Set(SetArgs),

    /// Make a server current and remember it for the next start
    Select {
        /// Server name or id
        server: String,
    },

    /// Clear the current server
    Deselect,

    /// Show the current server
    Current,

    /// Environment management for a server
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },

    /// Include folder management
    Includes {
        #[command(subcommand)]
        command: IncludesCommands,
    },

    /// Compile key management (servers up to build 7.00.191205P)
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// RPO token management (servers after build 7.00.191205P)
    Rpo {
        #[command(subcommand)]
        command: RpoCommands,
    },

    /// Show the authorization token a server would use
    Token {
        /// Server name or id
        server: String,
    },

    /// Where servers.json lives
    Location {
        #[command(subcommand)]
        command: LocationCommands,
    },

    /// Check which paths are skipped when sending resources
    Ignore {
        /// Paths to check
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Watch servers.json and print every change event
    Watch {
        /// Stop after this many seconds (runs until interrupted by default)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show version information
    Version,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Display name (must be unique)
    pub name: String,

    /// Host name or IP address
    #[arg(short, long)]
    pub address: String,

    /// TCP port
    #[arg(short, long)]
    pub port: u16,

    /// Server type: protheus or logix
    #[arg(short = 't', long = "type", default_value = "protheus")]
    pub server_type: String,

    /// Build version, if already known
    #[arg(short, long)]
    pub build: Option<String>,

    /// Use a secure connection
    #[arg(long)]
    pub secure: bool,

    /// Include folder (repeatable)
    #[arg(short, long = "include")]
    pub include: Vec<String>,

    /// Keep this id instead of generating one
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("paths").required(true).multiple(true)))]
pub struct SetArgs {
    /// Server name or id
    pub server: String,

    /// Directory where generated patches are written
    #[arg(long, group = "paths")]
    pub patch_dir: Option<String>,

    /// SmartClient executable used to run programs on this server
    #[arg(long, group = "paths")]
    pub smartclient: Option<String>,
}

/// Environment subcommands
#[derive(Subcommand, Debug)]
pub enum EnvCommands {
    /// Add an environment to a server
    Add {
        /// Server name or id
        server: String,
        /// Environment name
        environment: String,
    },

    /// Remove an environment from a server
    Remove {
        /// Server name or id
        server: String,
        /// Environment name
        environment: String,
    },
}

/// Include folder subcommands
#[derive(Subcommand, Debug)]
pub enum IncludesCommands {
    /// Show effective include folders
    Show {
        /// Server name or id (global list when omitted)
        #[arg(short, long)]
        server: Option<String>,

        /// Resolve against the workspace and drop invalid folders
        #[arg(long)]
        absolute: bool,
    },

    /// Replace include folders
    Set {
        /// Include folders
        paths: Vec<String>,

        /// Set the server's own list instead of the global one
        #[arg(short, long)]
        server: Option<String>,
    },
}

/// Compile key subcommands
#[derive(Subcommand, Debug)]
pub enum KeyCommands {
    /// Show the stored compile key
    Show,

    /// Store a compile key
    Set {
        /// Authorization token
        #[arg(long)]
        token: String,

        /// Expiry date (dd/mm/yyyy)
        #[arg(long)]
        expire: String,

        /// Permission level: 0 (restricted), 1 (full), 2 (no user functions)
        #[arg(long, default_value = "1")]
        build_type: String,

        /// Machine id the key was issued for
        #[arg(long)]
        machine_id: Option<String>,

        /// User id the key was issued for
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Delete the compile key
    Clear,
}

/// RPO token subcommands
#[derive(Subcommand, Debug)]
pub enum RpoCommands {
    /// Store an RPO token
    Set {
        /// Token text
        token: String,

        /// File the token was read from
        #[arg(long)]
        file: Option<String>,
    },

    /// Delete the RPO token
    Clear,
}

/// Location subcommands
#[derive(Subcommand, Debug)]
pub enum LocationCommands {
    /// Show the active servers.json and where the choice came from
    Show,

    /// Switch between the workspace and global servers.json
    Toggle,
}
