//! Prompt construction for each model call the assistant makes.

use report_core::ChatMessage;
use serde_json::Value;

pub const CLASSIFIER_SYSTEM: &str = "You classify messages a user sends about a strategy research report.\n\
Reply with a single JSON object and nothing else:\n\
{\"intent\": \"question\" | \"general\" | \"edit\" | \"explain\" | \"regenerate\",\n \
\"section\": \"<report section key, e.g. positioning or crossAnalysisSynthesis>\",\n \
\"field\": \"<field path inside the section, or null>\",\n \
\"desiredChange\": \"<for edit: the change requested>\",\n \
\"whatToExplain\": \"<for explain: the topic>\",\n \
\"instructions\": \"<for regenerate: the instructions>\"}\n\
Use edit when the user asks to change, rewrite or update report content.\n\
Use explain when the user asks why something in the report is the way it is.\n\
Use regenerate when the user asks to regenerate or redo a whole section.\n\
Use question for other questions about the report and general for everything else.";

const ANSWER_SYSTEM: &str = "You are a strategy analyst helping a user understand their research report.\n\
Answer using the report context below. Cite the section you rely on when it helps.\n\
If the context does not contain the answer, say so plainly.";

const EDIT_SYSTEM: &str = "You are a strategy analyst editing a research report at the user's request.\n\
First explain the proposed change in a few sentences of prose.\n\
Then output exactly one fenced JSON block of this shape:\n\
```json\n\
{\"isEdit\": true, \"edits\": [{\"section\": \"<section key>\", \"fieldPath\": \"<field path>\", \
\"oldValue\": <current value>, \"newValue\": <proposed value>, \"explanation\": \"<one sentence>\"}]}\n\
```\n\
Keep newValue the same JSON type as oldValue. Do not write anything after the block.";

const EXPLAIN_SYSTEM: &str = "You explain the reasoning behind a strategy research report.\n\
Reply with a single JSON object and nothing else:\n\
{\"explanation\": \"<clear explanation>\", \"confidence\": \"high\" | \"medium\" | \"low\",\n \
\"relatedFactors\": [{\"factor\": \"<supporting evidence>\", \"section\": \"<section key>\", \
\"fieldPath\": \"<optional field path>\", \"relevance\": \"high\" | \"medium\" | \"low\"}]}\n\
Ground every factor in the report context.";

pub fn classifier_messages(message: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(CLASSIFIER_SYSTEM),
        ChatMessage::user(message),
    ]
}

/// System prompt, grounding context, recent history, then the user turn.
pub fn answer_messages(context: &str, history: &[ChatMessage], message: &str) -> Vec<ChatMessage> {
    conversation(ANSWER_SYSTEM.to_string(), context, history, message)
}

pub fn edit_messages(
    section: &str,
    field: Option<&str>,
    desired_change: &str,
    document: &Value,
    context: &str,
    history: &[ChatMessage],
    message: &str
) -> Vec<ChatMessage> {
    let mut system = EDIT_SYSTEM.to_string();
    system.push_str(&format!("\n\nTarget section: {}", section));
    if let Some(field) = field {
        system.push_str(&format!("\nTarget field: {}", field));
    }
    system.push_str(&format!("\nRequested change: {}", desired_change));
    if let Some(current) = document.get(section) {
        let rendered =
            serde_json::to_string_pretty(current).unwrap_or_else(|_| current.to_string());
        system.push_str(&format!("\n\nCurrent content of {}:\n{}", section, rendered));
    }
    conversation(system, context, history, message)
}

pub fn explain_messages(
    section: &str,
    field: Option<&str>,
    what_to_explain: &str,
    context: &str,
    history: &[ChatMessage],
    message: &str
) -> Vec<ChatMessage> {
    let mut system = EXPLAIN_SYSTEM.to_string();
    let target = match field {
        Some(field) => format!("{}.{}", section, field),
        None => section.to_string()
    };
    system.push_str(&format!("\n\nExplain: {} (in {})", what_to_explain, target));
    conversation(system, context, history, message)
}

pub fn regenerate_placeholder(section: &str, instructions: &str) -> String {
    let mut text = format!(
        "Regenerating the {} section is not available from chat yet.",
        section
    );
    if !instructions.trim().is_empty() {
        text.push_str(&format!(" Your instructions were noted: \"{}\".", instructions.trim()));
    }
    text.push_str(&format!(
        " Use the regenerate action on the {} section of the report to rebuild it, \
         or ask me for a specific edit and I can propose the change here.",
        section
    ));
    text
}

fn conversation(
    system: String,
    context: &str,
    history: &[ChatMessage],
    message: &str
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(format!(
        "{}\n\n## Report context\n{}",
        system, context
    )));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(message));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_core::Role;
    use serde_json::json;

    #[test]
    fn test_answer_messages_order() {
        let history = vec![ChatMessage::user("earlier"), ChatMessage::assistant("reply")];
        let messages = answer_messages("CTX", &history, "now");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.ends_with("## Report context\nCTX"));
        assert_eq!(messages[1].content, "earlier");
        assert_eq!(messages[3].content, "now");
    }

    #[test]
    fn test_edit_messages_include_current_section() {
        let document = json!({"positioning": {"statement": "Old"}});
        let messages = edit_messages(
            "positioning",
            Some("statement"),
            "focus on AI",
            &document,
            "CTX",
            &[],
            "Change the positioning to focus on AI"
        );
        let system = &messages[0].content;
        assert!(system.contains("Target field: statement"));
        assert!(system.contains("\"statement\": \"Old\""));
        assert!(system.contains("isEdit"));
    }

    #[test]
    fn test_regenerate_placeholder_echoes_request() {
        let text = regenerate_placeholder("marketAnalysis", "use 2025 data");
        assert!(text.contains("marketAnalysis"));
        assert!(text.contains("use 2025 data"));
    }
}
