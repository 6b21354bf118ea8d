//! Instruction builders, one per task kind.
//!
//! Each builder is pure: same inputs, same prompt. The user's text always goes
//! last, between `"""` markers, so nothing it contains can be mistaken for an
//! instruction that follows it.

use crate::llm::GenerationParams;

/// Token budget shared by all tasks. Research briefings are the longest
/// replies; rewrites of a 200-word input need far less.
pub const MAX_OUTPUT_TOKENS: u32 = 8192;

pub const HUMANIZE_TEMPERATURE: f32 = 0.7;
pub const DETECT_TEMPERATURE: f32 = 0.2;
pub const PLAGIARIZE_TEMPERATURE: f32 = 0.2;
pub const RESEARCH_TEMPERATURE: f32 = 0.4;

pub const DEFAULT_TONE: &str = "neutral";
pub const DEFAULT_COMPLEXITY: &str = "general";

fn delimited(label: &str, text: &str) -> String {
    format!("{}:\n\"\"\"\n{}\n\"\"\"", label, text)
}

/// Treat absent and blank options alike.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Rewrite `text` so it reads as natural human writing.
pub fn humanize(
    text: &str,
    tone: Option<&str>,
    complexity: Option<&str>,
    dialect: Option<&str>,
    freeze_keywords: Option<&str>,
) -> GenerationParams {
    let tone = non_blank(tone).unwrap_or(DEFAULT_TONE);
    let complexity = non_blank(complexity).unwrap_or(DEFAULT_COMPLEXITY);

    let mut directives = vec![
        format!("Adopt a {} tone throughout.", tone),
        format!(
            "Match the vocabulary and sentence structure to a {} audience.",
            complexity
        ),
        "Fix grammar, clarity and flow. Vary sentence length and openings the way a skilled human writer would, and remove filler.".to_string(),
        "Preserve the original meaning. Do not add facts, opinions or examples that are not in the original.".to_string(),
    ];

    if let Some(dialect) = non_blank(dialect) {
        directives.push(format!(
            "STRICT: Write in {} exclusively, including its spelling, vocabulary and idiom.",
            dialect
        ));
    }

    if let Some(keywords) = non_blank(freeze_keywords) {
        let keywords: Vec<&str> = keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .collect();
        if !keywords.is_empty() {
            directives.push(format!(
                "STRICT: The following keywords must appear in the output exactly as written, unchanged and untranslated: {}.",
                keywords.join(", ")
            ));
        }
    }

    directives.push(
        "OUTPUT FORMAT: Respond ONLY with the rewritten text. No preamble, no introduction, no notes, no quotation marks around the result.".to_string(),
    );

    let numbered: Vec<String> = directives
        .iter()
        .enumerate()
        .map(|(i, d)| format!("{}. {}", i + 1, d))
        .collect();

    let prompt = format!(
        "You are an expert editor. Rewrite the text below so it sounds natural, engaging and human-written.\n\nDIRECTIVES:\n{}\n\n{}",
        numbered.join("\n"),
        delimited("ORIGINAL TEXT", text)
    );

    GenerationParams::new(prompt, MAX_OUTPUT_TOKENS, HUMANIZE_TEMPERATURE)
}

/// Forensic estimate of how likely `text` is machine-written.
pub fn detect(text: &str) -> GenerationParams {
    let prompt = format!(
        r#"You are a forensic linguist specializing in telling machine-generated text apart from human writing. Analyze the text below and weigh these signals:
1. Lexical diversity: a narrow or oddly uniform vocabulary, overused transition words.
2. Syntactic repetition: recurring sentence templates, lengths and openers.
3. Content vacuity: generic statements that sound informative but say little.
4. Unnatural phrasing: stilted collocations, hedging stacked on hedging, over-polished wording.
5. Tonal uniformity: an unchanging register with none of the variation of a human voice.

Score the text from 0 (certainly human) to 100 (certainly machine-generated).

OUTPUT FORMAT: Respond ONLY with minified JSON, no Markdown, matching exactly:
{{"overall_score":<integer 0-100>,"analysis":"<two to four sentences explaining the score>","red_flags":["<specific quoted phrase or pattern>"]}}
If you find no red flags, "red_flags" must be an empty array [].

{}"#,
        delimited("TEXT TO ANALYZE", text)
    );

    GenerationParams::new(prompt, MAX_OUTPUT_TOKENS, DETECT_TEMPERATURE)
}

/// Semantic similarity audit against the model's training knowledge.
pub fn plagiarize(text: &str) -> GenerationParams {
    let prompt = format!(
        r#"You are an originality auditor. Compare the text below against published material you know from your training data: books, articles, papers, well-known web pages. This is a semantic similarity check from memory, NOT a live web search, so do not invent URLs. Flag passages that closely paraphrase or copy a known source.

OUTPUT FORMAT: Respond ONLY with minified JSON, no Markdown, matching exactly:
{{"similarity_found":<true|false>,"overall_confidence":<number 0.0-1.0>,"matches":[{{"snippet":"<passage from the text>","source_description":"<title, author or kind of source>","confidence":<number 0.0-1.0>}}]}}
If no similarity is found, set "similarity_found" to false, report a low "overall_confidence", and return "matches" as an empty array []. Never omit "matches".

{}"#,
        delimited("TEXT TO AUDIT", text)
    );

    GenerationParams::new(prompt, MAX_OUTPUT_TOKENS, PLAGIARIZE_TEMPERATURE)
}

/// Structured briefing on `topic`.
pub fn research(topic: &str) -> GenerationParams {
    let prompt = format!(
        r#"You are a research analyst. Prepare a concise, accurate briefing on the topic below for an educated non-specialist.

Cover:
1. An executive summary of what the topic is and why it matters.
2. Historical context: origins and key developments.
3. Core concepts: the essential ideas, one per list item.
4. Critiques: the main criticisms, controversies or limitations, one per list item.
5. Applications: where and how it is used in practice, one per list item.

OUTPUT FORMAT: Respond ONLY with minified JSON, no Markdown, matching exactly:
{{"topic":"<topic name>","executive_summary":"<paragraph>","historical_context":"<paragraph>","core_concepts":["<string>"],"critiques":["<string>"],"applications":["<string>"]}}
Use empty arrays [] for any list you cannot fill. Never omit a field.

{}"#,
        delimited("TOPIC", topic)
    );

    GenerationParams::new(prompt, MAX_OUTPUT_TOKENS, RESEARCH_TEMPERATURE)
}
