//! Built-in prompt templates
//!
//! Each template is rendered with a serializable context struct from the
//! runner. Lists are rendered with `{{#each}}`; optional sections with `{{#if}}`.

pub const PLANNER: &str = "planner";
pub const PLANNER_STRUCTURED: &str = "planner_structured";
pub const EXECUTOR: &str = "executor";
pub const SYNTHESIZER: &str = "synthesizer";

pub const PLANNER_SYSTEM: &str = "You are a planning assistant for an autonomous onchain agent. \
Break goals into short, concrete, executable tasks.";

pub const SYNTHESIZER_SYSTEM: &str = "You decide the next objective for an autonomous onchain agent \
based on what it just accomplished. Respond with a single JSON object.";

pub(crate) const PLANNER_TEMPLATE: &str = r#"Break down this goal into {{min_tasks}} to {{max_tasks}} specific, actionable tasks:

Goal: {{goal}}

Each task must be achievable with these capabilities:
{{capabilities}}
{{#if hints}}

Notes from earlier iterations:
{{#each hints}}
- {{this.key}}: {{this.value}}
{{/each}}
{{/if}}

Return only the tasks as a numbered list, one task per line, with no other text."#;

pub(crate) const PLANNER_STRUCTURED_TEMPLATE: &str = r#"Break down this goal into {{min_tasks}} to {{max_tasks}} specific, actionable tasks:

Goal: {{goal}}

Each task must be achievable with these capabilities:
{{capabilities}}
{{#if hints}}

Notes from earlier iterations:
{{#each hints}}
- {{this.key}}: {{this.value}}
{{/each}}
{{/if}}

Respond with a JSON object of the form:
{"tasks": [{"description": "...", "prerequisites": ["..."], "risks": ["..."], "resources": ["..."], "success_criteria": "..."}]}"#;

pub(crate) const EXECUTOR_TEMPLATE: &str = r#"Execute this task: {{task}}

Overall goal: {{goal}}

Context from previous tasks:
{{context}}

Use the available tools when the task calls for an action, then reply with a short summary of the outcome including any transaction hashes or addresses."#;

pub(crate) const SYNTHESIZER_TEMPLATE: &str = r#"Previous goal: {{previous_goal}}

Results from this iteration:
{{#if results}}
{{#each results}}
- {{this}}
{{/each}}
{{else}}
(no task produced a result)
{{/if}}

Accumulated context:
{{context}}

Capabilities the agent can use:
{{capabilities}}

Choose the next goal. It must be reachable with the capabilities above and at most {{goal_max_chars}} characters.
If the previous goal has been fully achieved and nothing useful remains, say so instead.

Respond with one JSON object, either
{"status": "continue", "goal": "<next goal>"}
or
{"status": "complete", "reason": "<why the objective is met>"}"#;

/// Name and body of every built-in template
pub(crate) const BUILTIN: [(&str, &str); 4] = [
    (PLANNER, PLANNER_TEMPLATE),
    (PLANNER_STRUCTURED, PLANNER_STRUCTURED_TEMPLATE),
    (EXECUTOR, EXECUTOR_TEMPLATE),
    (SYNTHESIZER, SYNTHESIZER_TEMPLATE),
];
