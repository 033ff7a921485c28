use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result};
use rusqlite::{Transaction, params, params_from_iter};
use serde::Serialize;
use tracing::debug;

use super::extract::{CanonicalField, CanonicalRow};
use super::fields::FieldParsers;
use super::requirements::{ParsedScore, RequirementParser, RequirementStatus};
use super::standards::ExamType;

const DEFAULT_PROGRAM_TYPE: &str = "일반교환";
const UNCLASSIFIED_REGION: &str = "미분류";

/// Fallback nation -> region table, applied when the source row carries no
/// region or only the unclassified marker.
const COUNTRY_TO_REGION: &[(&str, &str)] = &[
    ("미국", "북미"),
    ("캐나다", "북미"),
    ("멕시코", "북미"),
    ("독일", "유럽"),
    ("영국", "유럽"),
    ("터키", "유럽"),
    ("프랑스", "유럽"),
    ("스페인", "유럽"),
    ("이탈리아", "유럽"),
    ("네덜란드", "유럽"),
    ("스위스", "유럽"),
    ("오스트리아", "유럽"),
    ("체코", "유럽"),
    ("폴란드", "유럽"),
    ("헝가리", "유럽"),
    ("스웨덴", "유럽"),
    ("노르웨이", "유럽"),
    ("덴마크", "유럽"),
    ("핀란드", "유럽"),
    ("벨기에", "유럽"),
    ("일본", "아시아"),
    ("중국", "아시아"),
    ("대만", "아시아"),
    ("키르기즈스탄", "아시아"),
    ("싱가포르", "아시아"),
    ("말레이시아", "아시아"),
    ("인도네시아", "아시아"),
    ("베트남", "아시아"),
    ("태국", "아시아"),
    ("호주", "오세아니아"),
    ("브라질", "남미"),
    ("칠레", "남미"),
];

pub fn region_for_nation(nation: &str) -> Option<&'static str> {
    COUNTRY_TO_REGION
        .iter()
        .find(|(country, _)| *country == nation)
        .map(|(_, region)| *region)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadStats {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub requirements: usize,
}

struct ExistingUniversity {
    id: i64,
    semester: Option<String>,
}

pub struct Loader {
    requirement_parser: RequirementParser,
    field_parsers: FieldParsers,
}

impl Loader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            requirement_parser: RequirementParser::new()?,
            field_parsers: FieldParsers::new()?,
        })
    }

    pub fn requirement_parser(&self) -> &RequirementParser {
        &self.requirement_parser
    }

    /// Upsert one normalized batch. Universities are keyed by
    /// (name_en, nation); the caller owns the transaction so a whole file
    /// commits or rolls back together.
    pub fn load_rows(&self, tx: &Transaction, rows: &[CanonicalRow]) -> Result<LoadStats> {
        let mut stats = LoadStats::default();
        let mut existing = lookup_existing(tx, rows)?;

        for row in rows {
            let Some(identity) = RowIdentity::from_row(row) else {
                stats.skipped += 1;
                continue;
            };

            let program_type = field(row, CanonicalField::ProgramType)
                .unwrap_or(DEFAULT_PROGRAM_TYPE)
                .to_string();
            let semester = field(row, CanonicalField::Semester).map(ToOwned::to_owned);

            let region = match field(row, CanonicalField::Region) {
                Some(region) if region != UNCLASSIFIED_REGION => region.to_string(),
                _ => region_for_nation(identity.nation)
                    .unwrap_or(UNCLASSIFIED_REGION)
                    .to_string(),
            };

            let min_gpa = self
                .field_parsers
                .parse_gpa(field(row, CanonicalField::MinGpaRaw));
            let website_url = self
                .field_parsers
                .parse_website_url(field(row, CanonicalField::WebsiteUrl));
            let review = field(row, CanonicalField::ReviewRaw)
                .map(|raw| self.field_parsers.parse_review(Some(raw)));

            let significant_note = field(row, CanonicalField::SignificantNote);
            let remark = join_remarks(
                field(row, CanonicalField::Remark),
                field(row, CanonicalField::RemarkRef),
            );
            let available_majors = field(row, CanonicalField::AvailableMajors);
            let badge = field(row, CanonicalField::InstitutionBadge);

            let is_exchange = program_type.contains("교환");
            let is_visit = program_type.contains("방문");

            let key = (identity.name_en.to_string(), identity.nation.to_string());
            let university_id = match existing.get(&key) {
                Some(entry) => {
                    let merged_semester =
                        merge_semesters(entry.semester.as_deref(), semester.as_deref());

                    tx.execute(
                        "
                        UPDATE university SET
                          semester = COALESCE(?1, semester),
                          region = ?2,
                          name_kr = ?3,
                          badge = COALESCE(?4, badge),
                          min_gpa = COALESCE(?5, min_gpa),
                          significant_note = COALESCE(?6, significant_note),
                          remark = COALESCE(?7, remark),
                          available_majors = COALESCE(?8, available_majors),
                          website_url = COALESCE(?9, website_url),
                          has_review = COALESCE(?10, has_review),
                          review_year = COALESCE(?11, review_year),
                          is_exchange = ?12,
                          is_visit = ?13
                        WHERE id = ?14
                        ",
                        params![
                            merged_semester,
                            region,
                            identity.name_kr,
                            badge,
                            min_gpa,
                            significant_note,
                            remark,
                            available_majors,
                            website_url,
                            review.as_ref().map(|(has_review, _)| *has_review),
                            review.as_ref().and_then(|(_, year)| year.clone()),
                            is_exchange,
                            is_visit,
                            entry.id,
                        ],
                    )
                    .context("failed to update university")?;

                    let id = entry.id;
                    existing.insert(
                        key,
                        ExistingUniversity {
                            id,
                            semester: merged_semester,
                        },
                    );
                    stats.updated += 1;
                    id
                }
                None => {
                    tx.execute(
                        "
                        INSERT INTO university(
                          semester, region, nation, name_kr, name_en, badge,
                          min_gpa, significant_note, remark, available_majors,
                          website_url, has_review, review_year, is_exchange, is_visit
                        )
                        VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                        ",
                        params![
                            semester,
                            region,
                            identity.nation,
                            identity.name_kr,
                            identity.name_en,
                            badge,
                            min_gpa,
                            significant_note,
                            remark,
                            available_majors,
                            website_url,
                            review
                                .as_ref()
                                .map(|(has_review, _)| *has_review)
                                .unwrap_or(false),
                            review.as_ref().and_then(|(_, year)| year.clone()),
                            is_exchange,
                            is_visit,
                        ],
                    )
                    .context("failed to insert university")?;

                    let id = tx.last_insert_rowid();
                    // Later rows in the same batch must see this record.
                    existing.insert(key, ExistingUniversity { id, semester });
                    stats.inserted += 1;
                    id
                }
            };

            let note_exclusions = self
                .requirement_parser
                .parse_exclusions(field(row, CanonicalField::SignificantNote));

            if let Some(requirement_text) = field(row, CanonicalField::LanguageRequirementRaw) {
                let parsed = self
                    .requirement_parser
                    .parse(Some(requirement_text), Some(&region));

                if parsed.status == RequirementStatus::Stated {
                    if parsed.scores.is_empty() {
                        debug!(
                            university = identity.name_en,
                            text = %parsed.raw_text,
                            "requirement text matched no known pattern"
                        );
                    }
                    stats.requirements += self.replace_requirements(
                        tx,
                        university_id,
                        &parsed.scores,
                        &parsed.excluded_tests,
                        &note_exclusions,
                    )?;
                }
            }
        }

        Ok(stats)
    }

    /// A requirement text block is a complete statement of current policy;
    /// the stored set is replaced, never merged.
    fn replace_requirements(
        &self,
        tx: &Transaction,
        university_id: i64,
        scores: &[ParsedScore],
        excluded_in_text: &BTreeSet<ExamType>,
        excluded_in_note: &BTreeSet<ExamType>,
    ) -> Result<usize> {
        tx.execute(
            "DELETE FROM language_requirement WHERE university_id = ?1",
            params![university_id],
        )
        .context("failed to clear language requirements")?;

        let mut statement = tx
            .prepare(
                "
                INSERT INTO language_requirement(
                  university_id, language_group, exam_type, min_score, level_code, is_available
                )
                VALUES(?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .context("failed to prepare language requirement insert")?;

        for score in scores {
            let is_available = !(excluded_in_text.contains(&score.exam_type)
                || excluded_in_note.contains(&score.exam_type));

            statement
                .execute(params![
                    university_id,
                    score.language_group.as_str(),
                    score.exam_type.as_str(),
                    score.min_score,
                    score.level_code,
                    is_available,
                ])
                .context("failed to insert language requirement")?;
        }

        Ok(scores.len())
    }
}

struct RowIdentity<'a> {
    name_kr: &'a str,
    name_en: &'a str,
    nation: &'a str,
}

impl<'a> RowIdentity<'a> {
    fn from_row(row: &'a CanonicalRow) -> Option<Self> {
        Some(Self {
            name_kr: field(row, CanonicalField::NameKr)?,
            name_en: field(row, CanonicalField::NameEn)?,
            nation: field(row, CanonicalField::Nation)?,
        })
    }
}

fn field(row: &CanonicalRow, field: CanonicalField) -> Option<&str> {
    row.get(field)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn join_remarks(remark: Option<&str>, remark_ref: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [remark, remark_ref].into_iter().flatten().collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// Union the accumulated semester list with the incoming one, de-duplicated
/// and re-sorted newest first.
fn merge_semesters(existing: Option<&str>, incoming: Option<&str>) -> Option<String> {
    let mut semesters = BTreeSet::<String>::new();

    if let Some(existing) = existing {
        for semester in existing.split(", ") {
            if !semester.trim().is_empty() {
                semesters.insert(semester.trim().to_string());
            }
        }
    }
    if let Some(incoming) = incoming {
        if !incoming.trim().is_empty() {
            semesters.insert(incoming.trim().to_string());
        }
    }

    if semesters.is_empty() {
        return None;
    }

    let joined = semesters
        .into_iter()
        .rev()
        .collect::<Vec<String>>()
        .join(", ");
    Some(joined)
}

/// One bulk query for every English name in the batch, keyed by
/// (name_en, nation).
fn lookup_existing(
    tx: &Transaction,
    rows: &[CanonicalRow],
) -> Result<HashMap<(String, String), ExistingUniversity>> {
    let mut names = BTreeSet::<&str>::new();
    for row in rows {
        if let Some(name_en) = field(row, CanonicalField::NameEn) {
            names.insert(name_en);
        }
    }

    let mut map = HashMap::new();
    if names.is_empty() {
        return Ok(map);
    }

    let placeholders = vec!["?"; names.len()].join(", ");
    let sql = format!(
        "SELECT id, name_en, nation, semester FROM university WHERE name_en IN ({placeholders})"
    );

    let mut statement = tx
        .prepare(&sql)
        .context("failed to prepare university lookup")?;
    let mut query_rows = statement
        .query(params_from_iter(names.iter()))
        .context("failed to query existing universities")?;

    while let Some(row) = query_rows.next()? {
        let id: i64 = row.get(0)?;
        let name_en: String = row.get(1)?;
        let nation: String = row.get(2)?;
        let semester: Option<String> = row.get(3)?;
        map.insert((name_en, nation), ExistingUniversity { id, semester });
    }

    Ok(map)
}
