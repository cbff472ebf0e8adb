//! Turns a free-text completion into a `code` + `explanation` pair.
//!
//! The model is asked for a strict JSON object but only follows that contract
//! some of the time, so the text goes through an ordered chain of strategies.
//! Every strategy is total: it either recognises the shape or passes.

use serde_json::Value;

use crate::wire::{CodeReply, GenerationResult};

pub const NO_CODE: &str = "No code provided.";
pub const NO_EXPLANATION: &str = "No explanation provided.";

const FENCE: &str = "```";
const CODE_MARKER: &str = "Code:";
const EXPLANATION_MARKER: &str = "Explanation:";

pub trait ReplyStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    /// `raw` is the completion as received, `unfenced` the same text after
    /// fence stripping.
    fn try_parse(&self, raw: &str, unfenced: &str) -> Option<CodeReply>;
}

/// The body is a JSON object (once any fence is removed).
pub struct JsonBody;

/// Loose `Code:` ... `Explanation:` sections.
pub struct Markers;

/// Anything else: the whole text is an explanation.
pub struct PlainText;

impl ReplyStrategy for JsonBody {
    fn name(&self) -> &'static str {
        "json"
    }

    fn try_parse(&self, _raw: &str, unfenced: &str) -> Option<CodeReply> {
        let v: Value = serde_json::from_str(unfenced).ok()?;
        let obj = v.as_object()?;
        Some(CodeReply {
            code: field_text(obj.get("code")).unwrap_or_else(|| NO_CODE.to_string()),
            explanation: field_text(obj.get("explanation")).unwrap_or_else(|| NO_EXPLANATION.to_string()),
        })
    }
}

impl ReplyStrategy for Markers {
    fn name(&self) -> &'static str {
        "markers"
    }

    fn try_parse(&self, raw: &str, _unfenced: &str) -> Option<CodeReply> {
        let code_at = raw.find(CODE_MARKER)?;
        let expl_at = raw.find(EXPLANATION_MARKER)?;
        let code_end = code_at + CODE_MARKER.len();
        let code = if code_end <= expl_at { raw[code_end..expl_at].trim() } else { "" };
        let explanation = raw[expl_at + EXPLANATION_MARKER.len()..].trim();
        Some(CodeReply::new(code, explanation))
    }
}

impl ReplyStrategy for PlainText {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn try_parse(&self, raw: &str, _unfenced: &str) -> Option<CodeReply> {
        Some(CodeReply::new("", raw.trim()))
    }
}

/// Default chain, in priority order.
pub fn default_chain() -> Vec<Box<dyn ReplyStrategy>> {
    vec![Box::new(JsonBody), Box::new(Markers), Box::new(PlainText)]
}

pub fn parse(raw: &str) -> GenerationResult {
    GenerationResult::Success(parse_reply(raw))
}

pub fn parse_reply(raw: &str) -> CodeReply {
    parse_with(&default_chain(), raw)
}

pub fn parse_with(chain: &[Box<dyn ReplyStrategy>], raw: &str) -> CodeReply {
    let unfenced = strip_fences(raw);
    for strategy in chain {
        if let Some(reply) = strategy.try_parse(raw, &unfenced) {
            tracing::debug!(strategy = strategy.name(), "parsed completion");
            return reply;
        }
    }
    CodeReply::new("", raw.trim())
}

/// Removes a surrounding ```` ``` ```` fence and a leading `json` tag.
/// Text that is not fenced comes back unchanged.
pub fn strip_fences(text: &str) -> String {
    let t = text.trim();
    if !(t.len() >= FENCE.len() && t.starts_with(FENCE) && t.ends_with(FENCE)) {
        return text.to_string();
    }
    let inner = t.trim_matches('`').trim();
    drop_language_tag(inner).to_string()
}

fn drop_language_tag(s: &str) -> &str {
    const TAG: &str = "json";
    match s.get(..TAG.len()) {
        Some(head) if head.eq_ignore_ascii_case(TAG) => {
            let rest = &s[TAG.len()..];
            match rest.chars().next() {
                Some(c) if c.is_alphanumeric() || c == '_' => s,
                _ => rest.trim(),
            }
        }
        _ => s,
    }
}

fn field_text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_with_tag() {
        let raw = "```json\n{\"code\":\"int x=1;\",\"explanation\":\"simple\"}\n```";
        assert_eq!(parse_reply(raw), CodeReply::new("int x=1;", "simple"));
    }

    #[test]
    fn fenced_json_uppercase_tag() {
        let raw = "```JSON {\"code\":\"a\",\"explanation\":\"b\"}```";
        assert_eq!(parse_reply(raw), CodeReply::new("a", "b"));
    }

    #[test]
    fn plain_json_values_are_unchanged() {
        let raw = r#"{"code":"void setup() {\n  Serial.begin(115200);\n}","explanation":"- starts serial"}"#;
        let reply = parse_reply(raw);
        assert_eq!(reply.code, "void setup() {\n  Serial.begin(115200);\n}");
        assert_eq!(reply.explanation, "- starts serial");
    }

    #[test]
    fn json_missing_keys_gets_placeholders() {
        assert_eq!(parse_reply("{}"), CodeReply::new(NO_CODE, NO_EXPLANATION));
        assert_eq!(parse_reply(r#"{"code":"x","explanation":null}"#), CodeReply::new("x", NO_EXPLANATION));
    }

    #[test]
    fn json_object_code_is_pretty_printed() {
        let reply = parse_reply(r#"{"code":{"t":1},"explanation":"short keys"}"#);
        assert_eq!(reply.code, "{\n  \"t\": 1\n}");
        assert_eq!(reply.explanation, "short keys");
    }

    #[test]
    fn json_array_is_not_an_object() {
        let reply = parse_reply("[1, 2]");
        assert_eq!(reply, CodeReply::new("", "[1, 2]"));
    }

    #[test]
    fn marker_fallback() {
        assert_eq!(
            parse_reply("Code: int x=1;\nExplanation: simple"),
            CodeReply::new("int x=1;", "simple")
        );
    }

    #[test]
    fn markers_are_case_sensitive() {
        let raw = "code: int x=1;\nexplanation: simple";
        assert_eq!(parse_reply(raw), CodeReply::new("", raw));
    }

    #[test]
    fn markers_out_of_order_give_empty_code() {
        let reply = parse_reply("Explanation: first\nCode: later");
        assert_eq!(reply.code, "");
        assert_eq!(reply.explanation, "first\nCode: later");
    }

    #[test]
    fn only_one_marker_is_plain_text() {
        let raw = "  Code: int x;  ";
        assert_eq!(parse_reply(raw), CodeReply::new("", "Code: int x;"));
    }

    #[test]
    fn refusal_is_explanation_only() {
        let reply = parse_reply("I cannot help with that.");
        assert_eq!(reply, CodeReply::new("", "I cannot help with that."));
        assert!(reply.is_explanation_only());
    }

    #[test]
    fn fenced_non_json_falls_back_to_original_text() {
        let raw = "```cpp\nvoid loop() {}\n```";
        assert_eq!(parse_reply(raw), CodeReply::new("", raw));
    }

    #[test]
    fn strip_is_noop_without_fence() {
        let s = "{\"code\":\"x\"}";
        assert_eq!(strip_fences(s), s);
        let once = strip_fences("```json\n{}\n```");
        assert_eq!(once, "{}");
        assert_eq!(strip_fences(&once), once);
    }

    #[test]
    fn tag_prefix_of_longer_word_is_kept() {
        assert_eq!(strip_fences("```jsonify me```"), "jsonify me");
    }

    #[test]
    fn lone_fence_does_not_panic() {
        assert_eq!(parse_reply("```"), CodeReply::new("", "```"));
        assert_eq!(parse_reply(""), CodeReply::new("", ""));
    }

    #[test]
    fn custom_chain_order_is_respected() {
        let chain: Vec<Box<dyn ReplyStrategy>> = vec![Box::new(PlainText), Box::new(JsonBody)];
        let reply = parse_with(&chain, r#"{"code":"x","explanation":"y"}"#);
        assert_eq!(reply.code, "");
    }

    #[test]
    fn parse_always_yields_success() {
        assert!(matches!(parse("anything"), GenerationResult::Success(_)));
    }
}
