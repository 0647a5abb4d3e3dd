//! Mutation executor
//!
//! Pulls the runnable script and the prose explanation apart from a model
//! response, then runs the script against the host inside the transaction
//! guard. The script is untrusted: it can fail halfway, open a transaction
//! and never close it, or push any number of native undo entries. Everything
//! here is written so none of that leaks past one workflow step.

use crate::error::{Error, Result};
use crate::host::HostSession;
use crate::undo::UndoRecord;

/// Literal token in model output meaning "no further steps needed"
pub const END_MARKER: &str = "[DONE]";

const FENCE: &str = "```";
const SCRIPT_LABEL: &str = "lua";

struct Block<'a> {
    label: &'a str,
    body: &'a str,
}

/// Split a response into fenced code blocks and surrounding prose. An
/// unterminated fence runs to the end of the input.
fn scan(response: &str) -> (Vec<Block<'_>>, Vec<&str>) {
    let mut blocks = Vec::new();
    let mut prose = Vec::new();
    let mut rest = response;

    loop {
        let Some(open) = rest.find(FENCE) else {
            prose.push(rest);
            break;
        };
        prose.push(&rest[..open]);

        let after_fence = &rest[open + FENCE.len()..];
        let (label, body_and_rest) = match after_fence.find('\n') {
            Some(nl) => (after_fence[..nl].trim(), &after_fence[nl + 1..]),
            None => (after_fence.trim(), ""),
        };

        match body_and_rest.find(FENCE) {
            Some(close) => {
                blocks.push(Block {
                    label,
                    body: &body_and_rest[..close],
                });
                rest = &body_and_rest[close + FENCE.len()..];
            }
            None => {
                blocks.push(Block {
                    label,
                    body: body_and_rest,
                });
                break;
            }
        }
    }

    (blocks, prose)
}

/// Extract the runnable script from a response. Labelled script fences are
/// preferred; plain fences count only when no labelled one exists anywhere.
/// Multiple blocks are concatenated with a blank line between them.
pub fn extract_script(response: &str) -> String {
    let (blocks, _) = scan(response);

    let labelled: Vec<&Block> = blocks.iter().filter(|b| b.label == SCRIPT_LABEL).collect();
    let chosen: Vec<&Block> = if labelled.is_empty() {
        blocks.iter().filter(|b| b.label.is_empty()).collect()
    } else {
        labelled
    };

    let mut script = String::new();
    for block in chosen {
        let body = block.body.trim_end_matches(['\n', '\r', ' ']);
        if body.is_empty() {
            continue;
        }
        if !script.is_empty() {
            script.push_str("\n\n");
        }
        script.push_str(body);
    }
    script
}

/// Extract the prose outside all code fences, trimmed
pub fn extract_explanation(response: &str) -> String {
    let (_, prose) = scan(response);
    let mut explanation: String = prose.concat();
    while explanation.starts_with(['\n', '\r']) {
        explanation.remove(0);
    }
    while explanation.ends_with(['\n', '\r', ' ']) {
        explanation.pop();
    }
    explanation
}

pub fn has_end_marker(response: &str) -> bool {
    response.contains(END_MARKER)
}

/// Remove every occurrence of the end marker, trimming what it leaves behind
pub fn strip_end_marker(text: &str) -> String {
    let mut out = text.replace(END_MARKER, "");
    while out.ends_with(['\n', '\r', ' ']) {
        out.pop();
    }
    out
}

/// Run one script against the host. Aborts any transaction left open by a
/// previous failed run before starting, and any transaction the script
/// opened but never closed afterwards, regardless of outcome.
pub fn execute(
    host: &mut dyn HostSession,
    script: &str,
    on_output: &mut dyn FnMut(&str),
) -> Result<()> {
    if script.trim().is_empty() {
        return Err(Error::EmptyScript);
    }

    host.abort_transaction();

    let result = host.run_script(script, on_output).map_err(Error::Script);

    host.abort_transaction();

    if let Err(ref e) = result {
        tracing::warn!(error = %e, "script execution failed");
    }
    result
}

/// Run one script inside the transaction guard. Snapshots first; on success
/// records how many native undo entries the script created and puts newly
/// automated controls into live playback; on failure rolls the host back
/// immediately.
pub fn execute_with_undo(
    host: &mut dyn HostSession,
    script: &str,
    on_output: &mut dyn FnMut(&str),
    record: &mut UndoRecord,
) -> Result<()> {
    record.snapshot(host);
    let depth_before = record.undo_depth_before();
    let automated_before = host.automated_controls();

    let result = execute(host, script, on_output);

    match result {
        Ok(()) => {
            record.native_undo_count = host.undo_depth().saturating_sub(depth_before);
            // Freshly written automation curves have to actually play back.
            for id in host.automated_controls() {
                if !automated_before.contains(&id) {
                    host.set_automation_live(id);
                }
            }
            Ok(())
        }
        Err(e) => {
            // Aborting a leaked transaction can itself drop undo entries, so
            // recount after it.
            host.abort_transaction();
            record.native_undo_count = host.undo_depth().saturating_sub(depth_before);
            record.restore(host);
            Err(e)
        }
    }
}
