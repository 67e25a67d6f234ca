//! Command-line shape of a non-interactive agent run.

/// Per-run knobs that change the agent's arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentInvocation {
    pub model: Option<String>,
    pub reasoning_effort: Option<String>,
    pub resume: bool,
}

const FIXED_POLICY_ARGS: [&str; 12] = [
    "exec",
    "--json",
    "--sandbox",
    "workspace-write",
    "-c",
    "approval_policy=\"never\"",
    "-c",
    "sandbox_workspace_write.network_access=true",
    "-c",
    "shell_environment_policy.inherit=all",
    "-c",
    "shell_environment_policy.ignore_default_excludes=true",
];

/// Arguments for `exec`, ending with `-` so the prompt is read from stdin.
pub fn build_exec_args(invocation: &AgentInvocation) -> Vec<String> {
    let mut args: Vec<String> = FIXED_POLICY_ARGS.iter().map(|arg| arg.to_string()).collect();
    if let Some(model) = non_empty(invocation.model.as_deref()) {
        args.push("--model".to_string());
        args.push(model.to_string());
    }
    if let Some(effort) = non_empty(invocation.reasoning_effort.as_deref()) {
        args.push("-c".to_string());
        args.push(format!("model_reasoning_effort={effort}"));
    }
    if invocation.resume {
        args.push("resume".to_string());
        args.push("--last".to_string());
    }
    args.push("-".to_string());
    args
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
