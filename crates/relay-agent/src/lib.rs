//! Agent process driver: invocation, login, captured runs, prompt rendering
//! and reduction of the streamed output to a single response.

pub mod agent_driver;
pub mod agent_invocation;
pub mod output_reconciler;
pub mod prompt;

pub use agent_driver::{AgentDriver, AgentDriverConfig, AgentRunError, AgentRunReport};
pub use agent_invocation::{build_exec_args, AgentInvocation};
pub use output_reconciler::{extract_agent_response, parse_agent_jsonl};
pub use prompt::{load_prompt_template, render_prompt, PromptContext, DEFAULT_PROMPT_TEMPLATE};
