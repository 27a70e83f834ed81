//! Operator review of translation drafts

use tolk_agent::{ApprovalRequest, ApprovalResponse};

pub const REVIEW_HELP: &str =
    "[Enter/a] approve  [r <reason>] reject  [e <text> | <reason>] edit";

/// Text shown when a draft is waiting for a decision
pub fn format_request(request: &ApprovalRequest) -> String {
    format!(
        "\n◆ Review ({})\n  source: {}\n  draft:  {}\n  {}",
        request.file_id, request.src_string, request.translate_string, REVIEW_HELP
    )
}

/// Parse one line typed by the operator. `None` means the line was not understood.
pub fn parse_review(line: &str, request: &ApprovalRequest) -> Option<ApprovalResponse> {
    let line = line.trim();
    let (command, rest) = line
        .split_once(char::is_whitespace)
        .map(|(c, r)| (c, r.trim()))
        .unwrap_or((line, ""));

    match command.to_lowercase().as_str() {
        "" | "a" | "approve" | "y" | "yes" if rest.is_empty() => {
            Some(ApprovalResponse::approve(request))
        }
        "r" | "reject" => Some(ApprovalResponse::reject(request, rest)),
        "e" | "edit" => {
            let (text, reason) = rest
                .split_once('|')
                .map(|(t, r)| (t.trim(), r.trim()))
                .unwrap_or((rest, ""));
            if text.is_empty() {
                return None;
            }
            Some(ApprovalResponse::refined(text, reason))
        }
        _ => None,
    }
}
