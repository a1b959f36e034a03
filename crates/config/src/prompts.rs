//! Prompt texts and the lookup order used to resolve them.
//!
//! A prompt is addressed by `(chain, model_core, agent_name)`. Lookup keys
//! are tried most specific first:
//!
//! 1. `<chain>.<model_core>`
//! 2. `<chain>.default`
//! 3. `agent_<suffix>.<chain>.default`, where `<suffix>` is the segment of
//!    the agent name after its first `_` (`agent_rutas` → `rutas`)

/// Chain name of the primary routing instruction.
pub const CHAIN_ROUTES_AGENT: &str = "routes_agent";

/// Chain name of the reflection instruction.
pub const CHAIN_REFLECTION: &str = "reflection";

/// Primary instruction for the `llm_call` node.
pub const PROMPT_ROUTES_AGENT: &str = "\
You are an assistant specialized in reporting the status of the roads of the \
province of Neuquén.

Example questions about roads:
- Which roads are available?
- Can you tell me about a road?
- What is the status of Route 40?

Instructions:
1. WHENEVER the user asks about roads or road status, you MUST call the \
'buscar_estado_rutas' tool with the query. Do not answer directly.
";

/// Instruction for the `reflection` node.
pub const PROMPT_REFLECTION: &str = "\
You have received these tool results.
1. Is this information sufficient to answer the original question?
   - If NOT, emit a new tool call naming the tool and its arguments.
   - If YES, return the final answer without tool calls.";

/// Ordered lookup keys for a prompt.
pub fn lookup_keys(chain: &str, model_core: &str, agent_name: &str) -> Vec<String> {
    let mut keys = vec![format!("{chain}.{model_core}"), format!("{chain}.default")];
    if let Some(suffix) = agent_name.split('_').nth(1).filter(|s| !s.is_empty()) {
        keys.push(format!("agent_{suffix}.{chain}.default"));
    }
    keys
}

/// Built-in prompt for a lookup key.
pub fn builtin(key: &str) -> Option<&'static str> {
    match key {
        "routes_agent.default" => Some(PROMPT_ROUTES_AGENT),
        "reflection.default" => Some(PROMPT_REFLECTION),
        _ => None,
    }
}
