//! syborg - borg backups with validated, keyring-cached credentials.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── backup        # Run a backup job
//! │   ├── wrapped       # list / info / mount / check
//! │   ├── completions   # Shell completions
//! │   └── output        # Terminal output helpers
//! └── core/             # Core library components
//!     ├── config        # INI configuration with defaults and interpolation
//!     ├── env           # Immutable environment overlays
//!     ├── process/      # Subprocess execution
//!     │   ├── mod       # Runner trait and system runner
//!     │   └── pty       # Terminal-attached children
//!     ├── keyring       # Kernel keyring secret cache
//!     ├── acquire       # Validated secret acquisition
//!     ├── agent         # ssh-agent session
//!     ├── identity      # ssh-add prompt handling
//!     ├── repository    # Per-repository environment
//!     ├── options       # borg options from config keys
//!     ├── backup        # Backup job orchestration
//!     └── dispatch      # Plain borg commands
//! ```
//!
//! # Features
//!
//! - Passphrase commands run once per day; results live in the kernel keyring
//! - Every cached secret is validated against the tool that consumes it
//! - One ssh-agent per run, always torn down
//! - Mirror repositories to rclone remotes after each backup

pub mod cli;
pub mod core;
pub mod error;
