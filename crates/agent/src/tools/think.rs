//! Think tool: deterministic text analysis
//!
//! Splits content into translatable segments, counts it, and guesses the
//! source language. No I/O and no model calls.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{LoopOptions, ToolError, ToolTrait, MAX_SEGMENT_CHARS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkAction {
    SegmentText,
    AnalyzeContent,
    PlanTranslation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub index: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkMetadata {
    pub total_length: usize,
    pub estimated_segments: usize,
    pub language_detected: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkOutput {
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<Segment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ThinkMetadata>,
}

/// Compiled patterns shared by the analysis actions
#[derive(Debug, Clone)]
pub struct TextAnalyzer {
    paragraph_break: Regex,
    sentence_end: Regex,
    english_words: Regex,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn estimate_segments(chars: usize) -> usize {
    chars.div_ceil(MAX_SEGMENT_CHARS)
}

impl TextAnalyzer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            paragraph_break: Regex::new(r"\n\s*\n")?,
            sentence_end: Regex::new(r"[.!?]+\s+")?,
            english_words: Regex::new(r"(?i)\b(the|and|or|but|in|on|at|to|for|of|with|by)\b")?,
        })
    }

    /// "Chinese", "English" or "Unknown"
    pub fn detect_language(&self, content: &str) -> &'static str {
        let english = self.english_words.find_iter(content).count();
        let cjk = content
            .chars()
            .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
            .count();

        if cjk > english {
            "Chinese"
        } else if english > 0 {
            "English"
        } else {
            "Unknown"
        }
    }

    /// Split into segments of at most [`MAX_SEGMENT_CHARS`] characters:
    /// paragraphs first, then sentences packed greedily, then hard chunks.
    pub fn segments(&self, content: &str) -> Vec<Segment> {
        let mut texts: Vec<String> = Vec::new();

        for paragraph in self.paragraph_break.split(content) {
            if paragraph.trim().is_empty() {
                continue;
            }
            if char_len(paragraph) <= MAX_SEGMENT_CHARS {
                texts.push(paragraph.trim().to_string());
                continue;
            }

            let mut current = String::new();
            for sentence in self.sentence_end.split(paragraph) {
                let sentence = sentence.trim();
                if sentence.is_empty() {
                    continue;
                }

                let joined = if current.is_empty() {
                    char_len(sentence)
                } else {
                    char_len(&current) + 2 + char_len(sentence)
                };
                if joined <= MAX_SEGMENT_CHARS {
                    if !current.is_empty() {
                        current.push_str(". ");
                    }
                    current.push_str(sentence);
                    continue;
                }

                if !current.trim().is_empty() {
                    texts.push(current.trim().to_string());
                }
                current.clear();

                let chars: Vec<char> = sentence.chars().collect();
                let mut chunks = chars.chunks(MAX_SEGMENT_CHARS).peekable();
                while let Some(chunk) = chunks.next() {
                    let chunk: String = chunk.iter().collect();
                    if chunks.peek().is_some() {
                        texts.push(chunk);
                    } else {
                        current = chunk;
                    }
                }
            }

            if !current.trim().is_empty() {
                texts.push(current.trim().to_string());
            }
        }

        texts
            .into_iter()
            .filter(|t| !t.is_empty())
            .enumerate()
            .map(|(index, text)| Segment {
                length: char_len(&text),
                text,
                index,
            })
            .collect()
    }

    pub fn segment_text(&self, content: &str) -> ThinkOutput {
        let segments = self.segments(content);
        ThinkOutput {
            result: format!("Successfully segmented text into {} parts", segments.len()),
            metadata: Some(ThinkMetadata {
                total_length: char_len(content),
                estimated_segments: segments.len(),
                language_detected: self.detect_language(content).to_string(),
            }),
            segments: Some(segments),
        }
    }

    pub fn analyze_content(&self, content: &str) -> ThinkOutput {
        let lines = content.split('\n').count();
        let words = content.split_whitespace().count();
        let chars = char_len(content);

        ThinkOutput {
            result: format!(
                "Content analysis: {} lines, {} words, {} characters",
                lines, words, chars
            ),
            segments: None,
            metadata: Some(ThinkMetadata {
                total_length: chars,
                estimated_segments: estimate_segments(chars),
                language_detected: self.detect_language(content).to_string(),
            }),
        }
    }

    pub fn plan_translation(&self, content: &str, context: Option<&str>) -> ThinkOutput {
        let chars = char_len(content);
        let segments = estimate_segments(chars);
        let language = self.detect_language(content);

        let mut result = format!(
            "Translation plan: {} segments needed, detected {} language",
            segments, language
        );
        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            result.push_str(&format!(", context: {}", context));
        }

        ThinkOutput {
            result,
            segments: None,
            metadata: Some(ThinkMetadata {
                total_length: chars,
                estimated_segments: segments,
                language_detected: language.to_string(),
            }),
        }
    }

    pub fn run(&self, action: ThinkAction, content: &str, context: Option<&str>) -> ThinkOutput {
        match action {
            ThinkAction::SegmentText => self.segment_text(content),
            ThinkAction::AnalyzeContent => self.analyze_content(content),
            ThinkAction::PlanTranslation => self.plan_translation(content, context),
        }
    }
}

#[derive(Deserialize)]
struct ThinkArgs {
    action: ThinkAction,
    content: String,
    context: Option<String>,
}

pub struct ThinkTool {
    analyzer: TextAnalyzer,
}

impl ThinkTool {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            analyzer: TextAnalyzer::new()?,
        })
    }
}

#[async_trait]
impl ToolTrait for ThinkTool {
    fn name(&self) -> &str {
        "Think"
    }

    fn description(&self) -> &str {
        "Analyze text content and plan a translation: segment text, count content, or estimate the work needed."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["segment_text", "analyze_content", "plan_translation"],
                    "description": "The analysis to perform"
                },
                "content": { "type": "string", "description": "Text to analyze" },
                "context": { "type": "string", "description": "Additional context for the analysis" }
            },
            "required": ["action", "content"]
        })
    }

    async fn execute(&self, args: Value, _options: &LoopOptions) -> Result<Value, ToolError> {
        let args: ThinkArgs = serde_json::from_value(args)?;
        let output = self
            .analyzer
            .run(args.action, &args.content, args.context.as_deref());
        Ok(serde_json::to_value(output)?)
    }
}
