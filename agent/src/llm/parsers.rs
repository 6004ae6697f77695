//! Tool call parser registry
//!
//! Some models answer with the tool call embedded in the content instead of
//! the `tool_calls` array. The registry tries parsers in priority order and
//! returns the first successful parse.

use regex::Regex;
use serde::Deserialize;

use super::ToolCall;

/// Trait for parsing tool calls from content
pub trait ToolCallParser: Send + Sync {
    /// Returns `Some(ToolCall)` if the content matches this parser's format
    fn parse(&self, content: &str) -> Option<ToolCall>;

    /// Parser name for logging/debugging
    fn name(&self) -> &'static str;

    /// Priority (higher = try first)
    fn priority(&self) -> u32;
}

/// Registry of tool call parsers
pub struct ToolCallParserRegistry {
    parsers: Vec<Box<dyn ToolCallParser>>,
}

impl Default for ToolCallParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCallParserRegistry {
    /// Create a new registry with all built-in parsers
    pub fn new() -> Self {
        let mut parsers: Vec<Box<dyn ToolCallParser>> = vec![
            Box::new(StandardParser),
            Box::new(XmlFunctionParser::new()),
        ];
        parsers.sort_by(|a, b| b.priority().cmp(&a.priority()));

        Self { parsers }
    }

    /// Try to parse content as a tool call, returning the parser name too
    pub fn parse(&self, content: &str) -> Option<(ToolCall, &'static str)> {
        let content = strip_code_fence(content.trim());

        self.parsers
            .iter()
            .find_map(|parser| parser.parse(content).map(|call| (call, parser.name())))
    }

    pub fn parser_names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }
}

/// Unwrap a single ```json fenced block
fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// OpenAI-compatible format: `{"name": "...", "arguments": {...}}`
pub struct StandardParser;

#[derive(Deserialize)]
struct StandardFormat {
    name: String,
    #[serde(alias = "parameters")]
    arguments: serde_json::Value,
}

impl ToolCallParser for StandardParser {
    fn parse(&self, content: &str) -> Option<ToolCall> {
        let parsed: StandardFormat = serde_json::from_str(content).ok()?;
        Some(ToolCall::new(parsed.name, parsed.arguments))
    }

    fn name(&self) -> &'static str {
        "StandardParser"
    }

    fn priority(&self) -> u32 {
        100
    }
}

/// XML-style calls: `<function=NAME><parameter=KEY>VALUE</parameter></function>`
pub struct XmlFunctionParser {
    function_re: Regex,
    param_re: Regex,
}

impl Default for XmlFunctionParser {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlFunctionParser {
    pub fn new() -> Self {
        Self {
            function_re: Regex::new(r"<function=([^>]+)>([\s\S]*?)</function>").unwrap(),
            // Values are SQL, which may contain `<`, so match up to the closing tag
            param_re: Regex::new(r"<parameter=([^>]+)>([\s\S]*?)</parameter>").unwrap(),
        }
    }
}

impl ToolCallParser for XmlFunctionParser {
    fn parse(&self, content: &str) -> Option<ToolCall> {
        let caps = self.function_re.captures(content)?;
        let name = caps.get(1)?.as_str().trim().to_string();
        let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        let mut args = serde_json::Map::new();
        for param_caps in self.param_re.captures_iter(body) {
            if let (Some(key), Some(value)) = (param_caps.get(1), param_caps.get(2)) {
                args.insert(
                    key.as_str().trim().to_string(),
                    serde_json::Value::String(value.as_str().trim().to_string()),
                );
            }
        }

        Some(ToolCall::new(name, serde_json::Value::Object(args)))
    }

    fn name(&self) -> &'static str {
        "XmlFunctionParser"
    }

    fn priority(&self) -> u32 {
        75
    }
}
