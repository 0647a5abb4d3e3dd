//! Prompt text and canned workflow messages

/// System prompt establishing the step protocol. Host specifics (available
/// actions, current state) are injected per request by the conversation
/// layer, not baked in here.
pub const SYSTEM_PROMPT: &str = "\
You are an automation copilot embedded in an audio production application. \
You help the user by generating scripts that the application executes \
through its built-in Lua scripting engine.

Rules:
- Respond with a short explanation followed by exactly one ```lua code \
block containing the script for the NEXT step only.
- Work one step at a time. After each step executes you will receive the \
updated session state and the script's printed output, and can continue.
- When every step is complete, respond with [DONE] and no code block, or \
include [DONE] after the final step's code block.
- If the request needs no script (a question, or nothing to do), answer in \
plain text without a code block.
- Use print() to report what the script did; that output is fed back to you.
- Scripts run against live user data. Prefer small, verifiable steps.";

/// Synthetic user message sent after a step executed successfully
pub fn continue_message(output: &str) -> String {
    let mut msg = String::from("Step completed successfully.");
    if !output.is_empty() {
        msg.push_str(" Output:\n");
        msg.push_str(output);
    }
    msg.push_str("\n\nContinue with the next step, or respond with [DONE] if all steps are complete.");
    msg
}

/// Synthetic user message sent when a step failed and a retry is available
pub fn retry_message(error: &str) -> String {
    format!("The script failed with this error: {error}\n\nPlease fix the code and try again.")
}

/// Plain-language requests that mean "roll back the last action" and are
/// handled locally instead of being sent to the model
pub fn is_undo_request(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "undo"
            | "undo that"
            | "undo this"
            | "revert"
            | "revert that"
            | "take that back"
            | "undo last"
            | "undo last action"
    )
}
