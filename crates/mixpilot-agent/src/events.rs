//! Events emitted by the orchestrator for the embedding UI to render

/// How a workflow ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// The model signalled completion and every step executed
    Completed,
    /// Text-only response, nothing to execute
    Informational,
    /// Step cap reached; executed work is retained
    StepLimit,
    /// Execution or transport failure ended the workflow
    Aborted,
    /// The user cancelled
    Cancelled,
}

/// One renderable occurrence. The orchestrator never talks to a UI
/// directly; it emits these and the caller decides presentation.
#[derive(Debug)]
pub enum CopilotEvent {
    /// Status-line text ("Step 2: Thinking...", "Idle", ...)
    Status(String),
    /// Incremental assistant text while a response streams
    AssistantDelta(String),
    /// A complete assistant explanation (not previously streamed)
    Assistant(String),
    /// System-side line: step banners, script text, errors, finish reasons
    Note(String),
    /// One line a script printed while executing
    ScriptOutput(String),
    /// Whether a rollback snapshot is currently available
    UndoAvailable(bool),
    /// Terminal event of a workflow
    Finished {
        outcome: WorkflowOutcome,
        reason: String,
    },
}
