use lo_core::config::OpsConfig;
use lo_core::types::CommandInvocation;

// ---------------------------------------------------------------------------
// Workflow files driven by command handlers
// ---------------------------------------------------------------------------

pub const VERIFY_WORKFLOW: &str = "verify.yml";
pub const DEPLOY_CLIENT_WORKFLOW: &str = "deploy-client.yml";
pub const DIAGNOSTICS_WORKFLOW: &str = "diagnostics.yml";

/// Workflows covered by `status` and `status-digest`, short name first.
pub const TRACKED_WORKFLOWS: &[(&str, &str)] = &[
    ("verify", VERIFY_WORKFLOW),
    ("deploy-client", DEPLOY_CLIENT_WORKFLOW),
    ("diagnostics", DIAGNOSTICS_WORKFLOW),
];

/// Resolve a user-supplied workflow short name to its file.
pub fn resolve_workflow(short_name: &str) -> Option<&'static str> {
    TRACKED_WORKFLOWS
        .iter()
        .find(|(name, _)| *name == short_name)
        .map(|(_, file)| *file)
}

// ---------------------------------------------------------------------------
// Command table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorClass {
    /// Resolves synchronously within the request/response cycle.
    Fast,
    /// Acknowledged immediately, completed by a background task.
    LongRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthTier {
    Any,
    Admin,
}

/// One entry of the static command table, resolved once at startup.
#[derive(Debug, Clone, Copy)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub behavior: BehaviorClass,
    pub auth: AuthTier,
    /// Destructive commands additionally require `confirm: true`.
    pub requires_confirm: bool,
}

pub const COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor {
        name: "verify-latest",
        description: "Latest verification run",
        behavior: BehaviorClass::Fast,
        auth: AuthTier::Any,
        requires_confirm: false,
    },
    CommandDescriptor {
        name: "verify-run",
        description: "One workflow run by id",
        behavior: BehaviorClass::Fast,
        auth: AuthTier::Any,
        requires_confirm: false,
    },
    CommandDescriptor {
        name: "diagnose",
        description: "Dispatch the diagnostics workflow and wait for it",
        behavior: BehaviorClass::LongRunning,
        auth: AuthTier::Any,
        requires_confirm: false,
    },
    CommandDescriptor {
        name: "status",
        description: "Recent runs of a tracked workflow",
        behavior: BehaviorClass::Fast,
        auth: AuthTier::Any,
        requires_confirm: false,
    },
    CommandDescriptor {
        name: "deploy-client",
        description: "Deploy the Lodge web client",
        behavior: BehaviorClass::LongRunning,
        auth: AuthTier::Any,
        requires_confirm: false,
    },
    CommandDescriptor {
        name: "set-frontend",
        description: "Point the deploy pipeline at a new frontend URL",
        behavior: BehaviorClass::Fast,
        auth: AuthTier::Admin,
        requires_confirm: true,
    },
    CommandDescriptor {
        name: "set-api-base",
        description: "Point the client at a new API base URL",
        behavior: BehaviorClass::Fast,
        auth: AuthTier::Admin,
        requires_confirm: true,
    },
    CommandDescriptor {
        name: "agents",
        description: "List automation entry points",
        behavior: BehaviorClass::Fast,
        auth: AuthTier::Any,
        requires_confirm: false,
    },
    CommandDescriptor {
        name: "status-digest",
        description: "Daily or weekly workflow outcome digest",
        behavior: BehaviorClass::Fast,
        auth: AuthTier::Any,
        requires_confirm: false,
    },
    CommandDescriptor {
        name: "debug-last",
        description: "Your most recent execution trace (redacted)",
        behavior: BehaviorClass::Fast,
        auth: AuthTier::Any,
        requires_confirm: false,
    },
];

pub fn lookup(name: &str) -> Option<&'static CommandDescriptor> {
    COMMANDS.iter().find(|descriptor| descriptor.name == name)
}

/// `deploy-client` only goes through the deferred path when the requester
/// asked to wait on the run.
pub fn effective_behavior(descriptor: &CommandDescriptor, invocation: &CommandInvocation) -> BehaviorClass {
    match descriptor.name {
        "deploy-client" if invocation.arg_bool("wait") != Some(true) => BehaviorClass::Fast,
        _ => descriptor.behavior,
    }
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NotAdmin,
    MissingConfirm,
}

impl Denial {
    pub fn user_message(&self, command: &str) -> String {
        match self {
            Denial::NotAdmin => {
                format!("🚫 `{command}` is admin-only; ask an operator to run it")
            }
            Denial::MissingConfirm => {
                format!("⚠️ `{command}` changes live configuration; re-run it with `confirm: true`")
            }
        }
    }
}

/// Check the requester against the command's authorization requirements.
/// Denials mutate no state.
pub fn authorize(
    descriptor: &CommandDescriptor,
    invocation: &CommandInvocation,
    config: &OpsConfig,
) -> Result<(), Denial> {
    if descriptor.auth == AuthTier::Admin
        && !config.is_admin(&invocation.requester_id, &invocation.requester_roles)
    {
        return Err(Denial::NotAdmin);
    }
    if descriptor.requires_confirm && invocation.arg_bool("confirm") != Some(true) {
        return Err(Denial::MissingConfirm);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
