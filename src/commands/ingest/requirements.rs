use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use regex::Regex;

use super::standards::{
    ExamType, LanguageGroup, cefr_to_score, dele_to_score, italian_cefr_to_score,
    normalize_legacy_code, standard_for,
};

/// How far back (in characters) the exclusion-note scan walks from a
/// 제외/불가 keyword while collecting exam-name tokens.
pub const EXCLUSION_SCAN_WINDOW: usize = 50;

/// Distinguishes text that is simply missing from an explicit waiver phrase.
/// The loader writes requirement rows only for `Stated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementStatus {
    /// No requirement text at all. Not the same as a waiver.
    Absent,
    /// The text says no language score is needed (면제, 불필요, N/A, ...).
    Waived,
    /// A concrete requirement statement; scores may still be empty if
    /// nothing matched any known pattern.
    Stated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    /// Expanded from a coded proficiency tier.
    Code,
    /// Stated directly in the text.
    Direct,
    /// Stated directly, replacing a coded default for the same exam.
    DirectOverride,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScore {
    pub exam_type: ExamType,
    pub min_score: f64,
    /// The source proficiency code when derived from (or matched alongside)
    /// a coded standard, or the letter grade for letter-graded exams.
    pub level_code: Option<String>,
    pub language_group: LanguageGroup,
    pub source: ScoreSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLanguageRequirement {
    pub status: RequirementStatus,
    pub scores: Vec<ParsedScore>,
    pub excluded_tests: BTreeSet<ExamType>,
    pub raw_text: String,
}

impl ParsedLanguageRequirement {
    fn with_status(status: RequirementStatus, raw_text: &str) -> Self {
        Self {
            status,
            scores: Vec::new(),
            excluded_tests: BTreeSet::new(),
            raw_text: raw_text.to_string(),
        }
    }

    pub fn score_for(&self, exam_type: ExamType) -> Option<&ParsedScore> {
        self.scores.iter().find(|score| score.exam_type == exam_type)
    }
}

enum ScoreConverter {
    /// Plain or comma-grouped number, decimals allowed.
    Number,
    /// CEFR letter grade on the DELF/ZD ordinal scale.
    Cefr,
    /// DELE diploma grade (ranks downward).
    Dele,
    /// CELI/CILS grade on the Italian ordinal scale.
    ItalianCefr,
}

impl ScoreConverter {
    fn convert(&self, raw: &str) -> Option<f64> {
        match self {
            Self::Number => raw.replace(',', "").parse::<f64>().ok(),
            Self::Cefr => cefr_to_score(raw),
            Self::Dele => dele_to_score(raw),
            Self::ItalianCefr => italian_cefr_to_score(raw),
        }
    }

    fn is_letter_grade(&self) -> bool {
        !matches!(self, Self::Number)
    }
}

struct ScoreRule {
    pattern: Regex,
    exam_type: ExamType,
    converter: ScoreConverter,
}

struct ExclusionRule {
    pattern: Regex,
    exam_type: ExamType,
}

pub struct RequirementParser {
    score_rules: Vec<ScoreRule>,
    exclusion_rules: Vec<ExclusionRule>,
    waiver_patterns: Vec<Regex>,
    explicit_eu_code: Regex,
    europe_prefixed_code: Regex,
    china_prefixed_code: Regex,
    japan_prefixed_code: Regex,
    generic_code: Regex,
    token_split: Regex,
}

impl RequirementParser {
    pub fn new() -> Result<Self> {
        // Ordered: for overlapping spellings the more specific rule must run
        // first so its level code wins the first-insert slot.
        let rule_table: Vec<(&str, ExamType, ScoreConverter)> = vec![
            (
                r"(?i)TOEFL\s*(?:\(iBT\)|iBT)?\s*(\d+)",
                ExamType::Toefl,
                ScoreConverter::Number,
            ),
            (
                r"(?i)TOEFL\s*(?:ITP|PBT)\s*([\d,]+)",
                ExamType::ToeflItp,
                ScoreConverter::Number,
            ),
            (
                r"(?i)토플\s*(?:iBT)?\s*(\d+)",
                ExamType::Toefl,
                ScoreConverter::Number,
            ),
            (r"(?i)TOEIC\s*([\d,]+)", ExamType::Toeic, ScoreConverter::Number),
            (r"토익\s*([\d,]+)", ExamType::Toeic, ScoreConverter::Number),
            (
                r"(?i)(?:IELTS|ITELTS|IETS)\s*(\d+(?:\.\d+)?)",
                ExamType::Ielts,
                ScoreConverter::Number,
            ),
            (
                r"아이엘츠\s*(\d+(?:\.\d+)?)",
                ExamType::Ielts,
                ScoreConverter::Number,
            ),
            (
                r"(?i)DUOLINGO\s*(\d+)",
                ExamType::Duolingo,
                ScoreConverter::Number,
            ),
            (
                r"(?i)신?HSK\s*(\d+)\s*급?",
                ExamType::Hsk,
                ScoreConverter::Number,
            ),
            (r"(?i)JLPT\s*N(\d)", ExamType::Jlpt, ScoreConverter::Number),
            (r"(?i)JPT\s*([\d,]+)", ExamType::Jpt, ScoreConverter::Number),
            (
                r"(?i)DELF\s*([A-C][12])",
                ExamType::Delf,
                ScoreConverter::Cefr,
            ),
            (r"(?i)ZD\s*([A-C][12])", ExamType::Zd, ScoreConverter::Cefr),
            (
                r"(?i)DELE\s*([A-C][12])",
                ExamType::Dele,
                ScoreConverter::Dele,
            ),
            (
                r"(?i)CELI\s*([A-C][12])",
                ExamType::Celi,
                ScoreConverter::ItalianCefr,
            ),
            (
                r"(?i)CILS\s*([A-C][12])",
                ExamType::Cils,
                ScoreConverter::ItalianCefr,
            ),
            (
                r"(?i)TOPIK\s*(\d)\s*급?",
                ExamType::Topik,
                ScoreConverter::Number,
            ),
        ];

        let mut score_rules = Vec::with_capacity(rule_table.len());
        for (pattern, exam_type, converter) in rule_table {
            score_rules.push(ScoreRule {
                pattern: Regex::new(pattern)
                    .with_context(|| format!("failed to compile score pattern: {pattern}"))?,
                exam_type,
                converter,
            });
        }

        let exclusion_table: Vec<(&str, ExamType)> = vec![
            (r"(?i)TOEIC[^가-힣]*제외", ExamType::Toeic),
            (r"(?i)ITP[^가-힣]*제외", ExamType::ToeflItp),
            (r"토익[^가-힣]*제외", ExamType::Toeic),
        ];

        let mut exclusion_rules = Vec::with_capacity(exclusion_table.len());
        for (pattern, exam_type) in exclusion_table {
            exclusion_rules.push(ExclusionRule {
                pattern: Regex::new(pattern)
                    .with_context(|| format!("failed to compile exclusion pattern: {pattern}"))?,
                exam_type,
            });
        }

        let waiver_sources = [
            r"어학\s*성적?\s*없음",
            r"면제",
            r"불필요",
            r"(?i)\bN/?A\b",
        ];
        let mut waiver_patterns = Vec::with_capacity(waiver_sources.len());
        for pattern in waiver_sources {
            waiver_patterns.push(
                Regex::new(pattern)
                    .with_context(|| format!("failed to compile waiver pattern: {pattern}"))?,
            );
        }

        Ok(Self {
            score_rules,
            exclusion_rules,
            waiver_patterns,
            explicit_eu_code: Regex::new(r"\bEU_([A-E][1-5])\b")
                .context("failed to compile explicit EU code pattern")?,
            europe_prefixed_code: Regex::new(r"유럽(?:권)?\s*([A-E]-?[1-5])")
                .context("failed to compile Europe-prefixed code pattern")?,
            china_prefixed_code: Regex::new(r"중국(?:어)?(?:권)?\s*(B-?[1-3])")
                .context("failed to compile China-prefixed code pattern")?,
            japan_prefixed_code: Regex::new(r"일본(?:어)?(?:권)?\s*(C-?[1-2])")
                .context("failed to compile Japan-prefixed code pattern")?,
            generic_code: Regex::new(r"\b([A-E]-?[1-5])\b")
                .context("failed to compile generic code pattern")?,
            token_split: Regex::new(r"[,/\s()\[\]]+")
                .context("failed to compile token split pattern")?,
        })
    }

    /// Parse one requirement cell. `region_hint` steers ambiguous tier codes
    /// (a bare "B2" is a Chinese tier unless the university is in Europe).
    pub fn parse(&self, text: Option<&str>, region_hint: Option<&str>) -> ParsedLanguageRequirement {
        let trimmed = text.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            return ParsedLanguageRequirement::with_status(RequirementStatus::Absent, "");
        }

        if self
            .waiver_patterns
            .iter()
            .any(|pattern| pattern.is_match(trimmed))
        {
            return ParsedLanguageRequirement::with_status(RequirementStatus::Waived, trimmed);
        }

        let mut result =
            ParsedLanguageRequirement::with_status(RequirementStatus::Stated, trimmed);

        for rule in &self.exclusion_rules {
            if rule.pattern.is_match(trimmed) {
                result.excluded_tests.insert(rule.exam_type);
            }
        }

        let codes = self.match_standard_codes(trimmed, region_hint);
        let mut entries = BTreeMap::<ExamType, ParsedScore>::new();

        // Coded tiers set the baseline. Codes are resolved in match order and
        // a later code never displaces an earlier code's entry.
        for code in &codes {
            let Some(standard) = standard_for(code) else {
                continue;
            };
            for (exam_type, min_score) in standard.scores {
                if result.excluded_tests.contains(exam_type) {
                    continue;
                }
                entries.entry(*exam_type).or_insert(ParsedScore {
                    exam_type: *exam_type,
                    min_score: *min_score,
                    level_code: Some(code.clone()),
                    language_group: standard.group,
                    source: ScoreSource::Code,
                });
            }
        }

        // Directly stated scores override coded defaults and are never
        // themselves overwritten by a code.
        for rule in &self.score_rules {
            if result.excluded_tests.contains(&rule.exam_type) {
                continue;
            }

            for captures in rule.pattern.captures_iter(trimmed) {
                let Some(raw) = captures.get(1).map(|group| group.as_str()) else {
                    continue;
                };
                let Some(min_score) = rule.converter.convert(raw) else {
                    continue;
                };

                match entries.get_mut(&rule.exam_type) {
                    Some(entry) => {
                        entry.min_score = min_score;
                        if entry.source == ScoreSource::Code {
                            entry.source = ScoreSource::DirectOverride;
                        }
                    }
                    None => {
                        let level_code = if rule.converter.is_letter_grade() {
                            Some(raw.to_uppercase())
                        } else {
                            // Attribute the score to a matched code of the
                            // same language family when one exists.
                            codes
                                .iter()
                                .find(|code| {
                                    standard_for(code).is_some_and(|standard| {
                                        standard.group == rule.exam_type.language_group()
                                    })
                                })
                                .cloned()
                        };

                        entries.insert(
                            rule.exam_type,
                            ParsedScore {
                                exam_type: rule.exam_type,
                                min_score,
                                level_code,
                                language_group: rule.exam_type.language_group(),
                                source: ScoreSource::Direct,
                            },
                        );
                    }
                }
            }
        }

        result.scores = entries.into_values().collect();
        result
    }

    /// Extract coded tiers in deterministic order: explicit EU_* forms, then
    /// region-prefixed Korean forms, then bare letter codes steered by the
    /// region hint. First occurrence wins on duplicates.
    fn match_standard_codes(&self, text: &str, region_hint: Option<&str>) -> Vec<String> {
        let text_upper = text.to_uppercase();
        let is_europe = region_hint.is_some_and(|region| region.contains("유럽"))
            || text_upper.contains("유럽");

        let mut codes = Vec::<String>::new();
        let mut push = |code: String, codes: &mut Vec<String>| {
            if standard_for(&code).is_some() && !codes.contains(&code) {
                codes.push(code);
            }
        };

        for captures in self.explicit_eu_code.captures_iter(&text_upper) {
            push(format!("EU_{}", &captures[1]), &mut codes);
        }

        for captures in self.europe_prefixed_code.captures_iter(&text_upper) {
            let grade = normalize_legacy_code(&captures[1]);
            push(format!("EU_{grade}"), &mut codes);
        }

        for captures in self.china_prefixed_code.captures_iter(&text_upper) {
            let grade = normalize_legacy_code(&captures[1]);
            push(format!("CN_{grade}"), &mut codes);
        }

        for captures in self.japan_prefixed_code.captures_iter(&text_upper) {
            let grade = normalize_legacy_code(&captures[1]);
            push(format!("JP_{grade}"), &mut codes);
        }

        for captures in self.generic_code.captures_iter(&text_upper) {
            let grade = normalize_legacy_code(&captures[1]);
            let Some(family) = grade.chars().next() else {
                continue;
            };

            match family {
                'A' => {
                    if is_europe && standard_for(&format!("EU_{grade}")).is_some() {
                        push(format!("EU_{grade}"), &mut codes);
                    } else {
                        push(grade.clone(), &mut codes);
                    }
                }
                'B' => {
                    if is_europe && standard_for(&format!("EU_{grade}")).is_some() {
                        push(format!("EU_{grade}"), &mut codes);
                    } else {
                        push(format!("CN_{grade}"), &mut codes);
                    }
                }
                'C' => {
                    if is_europe && standard_for(&format!("EU_{grade}")).is_some() {
                        push(format!("EU_{grade}"), &mut codes);
                    } else {
                        push(format!("JP_{grade}"), &mut codes);
                    }
                }
                'D' | 'E' => push(grade.clone(), &mut codes),
                _ => {}
            }
        }

        codes
    }

    /// Scan a free-text note for excluded exams: from each 제외/불가 keyword,
    /// walk tokens backward within `EXCLUSION_SCAN_WINDOW` characters,
    /// collecting known exam names and stopping at the first Korean-script
    /// token that is not itself a recognized alias.
    pub fn parse_exclusions(&self, note: Option<&str>) -> BTreeSet<ExamType> {
        let mut excluded = BTreeSet::new();

        let Some(note) = note else {
            return excluded;
        };
        if note.trim().is_empty() {
            return excluded;
        }

        // Normalize multi-word exam names so tokenization keeps them whole.
        let normalized = note
            .to_uppercase()
            .replace("TOEFL ITP", "TOEFL_ITP")
            .replace("TOEFL PBT", "TOEFL_ITP")
            .replace("TOEFL IBT", "TOEFL");

        for keyword in ["제외", "불가"] {
            for (index, _) in normalized.match_indices(keyword) {
                let head = &normalized[..index];
                let window_start = head
                    .char_indices()
                    .rev()
                    .nth(EXCLUSION_SCAN_WINDOW - 1)
                    .map(|(position, _)| position)
                    .unwrap_or(0);
                let window = &head[window_start..];

                let tokens: Vec<&str> = self.token_split.split(window).collect();
                for token in tokens.into_iter().rev() {
                    let token = token.trim();
                    if token.is_empty() {
                        continue;
                    }

                    if let Some(exam) = ExamType::from_token(token) {
                        excluded.insert(exam);
                    } else if token.contains("ITP") {
                        excluded.insert(ExamType::ToeflItp);
                    } else if token.contains("IBT") {
                        excluded.insert(ExamType::Toefl);
                    } else if contains_korean(token) {
                        // Unrelated prose; stop before over-matching.
                        break;
                    }
                }
            }
        }

        excluded
    }
}

fn contains_korean(token: &str) -> bool {
    token.chars().any(|character| ('가'..='힣').contains(&character))
}
