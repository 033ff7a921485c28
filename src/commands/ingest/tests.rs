use rusqlite::Connection;

use super::db_setup::ensure_schema;
use super::extract::{CanonicalField, CanonicalRow, ColumnLabel, TableExtractor};
use super::fields::FieldParsers;
use super::load::{Loader, region_for_nation};
use super::normalize::{NormalizeConfig, clean_rows};
use super::requirements::{RequirementParser, RequirementStatus, ScoreSource};
use super::standards::{ExamType, normalize_legacy_code, standard_for};
use super::workbook::{RawGrid, format_number, select_main_sheet};
use crate::commands::inventory::FileMetadata;

fn grid(rows: &[&[&str]]) -> RawGrid {
    rows.iter()
        .map(|cells| {
            cells
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        None
                    } else {
                        Some((*cell).to_string())
                    }
                })
                .collect()
        })
        .collect()
}

fn extractor() -> TableExtractor {
    TableExtractor::new().unwrap()
}

fn parser() -> RequirementParser {
    RequirementParser::new().unwrap()
}

fn base_row(name_kr: &str, name_en: &str, nation: &str) -> CanonicalRow {
    let mut row = CanonicalRow::default();
    row.set(CanonicalField::NameKr, name_kr.to_string());
    row.set(CanonicalField::NameEn, name_en.to_string());
    row.set(CanonicalField::Nation, nation.to_string());
    row
}

fn test_connection() -> Connection {
    let connection = Connection::open_in_memory().unwrap();
    ensure_schema(&connection).unwrap();
    connection
}

// ---------------------------------------------------------------- workbook

#[test]
fn select_main_sheet_prefers_keyword_match() {
    let names = vec![
        "표지".to_string(),
        "지원가능대학 목록".to_string(),
        "기타".to_string(),
    ];
    assert_eq!(
        select_main_sheet(&names),
        Some("지원가능대학 목록".to_string())
    );
}

#[test]
fn select_main_sheet_falls_back_to_first() {
    let names = vec!["Sheet1".to_string(), "Sheet2".to_string()];
    assert_eq!(select_main_sheet(&names), Some("Sheet1".to_string()));
    assert_eq!(select_main_sheet(&[]), None);
}

#[test]
fn format_number_drops_integral_fraction() {
    assert_eq!(format_number(850.0), "850");
    assert_eq!(format_number(6.5), "6.5");
}

// ----------------------------------------------------------------- extract

#[test]
fn extract_finds_header_below_banner_rows() {
    let source = grid(&[
        &["2025-1학기 파견 교환학생"],
        &[],
        &[
            "국가명",
            "지역",
            "프로그램 구분",
            "대학명(한글)",
            "대학명(영문)",
            "어학성적",
            "최소 학점",
        ],
        &[
            "미국",
            "북미",
            "교환",
            "스탠포드대학교",
            "Stanford University",
            "A2",
            "3.0 이상",
        ],
    ]);

    let table = extractor().extract(&source);

    assert!(!table.header_fallback);
    assert_eq!(
        table.header[0],
        ColumnLabel::Canonical(CanonicalField::Nation)
    );
    assert_eq!(
        table.header[4],
        ColumnLabel::Canonical(CanonicalField::NameEn)
    );
    assert_eq!(table.rows.len(), 1);
    assert_eq!(
        table.rows[0].get(CanonicalField::NameEn),
        Some("Stanford University")
    );
    assert_eq!(
        table.rows[0].get(CanonicalField::LanguageRequirementRaw),
        Some("A2")
    );
}

#[test]
fn extract_merges_two_row_headers() {
    let source = grid(&[
        &["국가명", "대학명(한글)", "대학명(영문)", "지원 자격", ""],
        &["", "", "", "최소 학점", "어학성적"],
        &["일본", "게이오대학", "Keio University", "2.5", "JLPT N2"],
    ]);

    let table = extractor().extract(&source);

    assert_eq!(
        table.header[3],
        ColumnLabel::Canonical(CanonicalField::MinGpaRaw)
    );
    assert_eq!(
        table.header[4],
        ColumnLabel::Canonical(CanonicalField::LanguageRequirementRaw)
    );
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].get(CanonicalField::MinGpaRaw), Some("2.5"));
}

#[test]
fn extract_collapses_duplicate_columns_in_order() {
    let source = grid(&[
        &["국가명", "대학명(한글)", "비고", "비고"],
        &["미국", "연세대학교", "기숙사 제공", "셔틀 운행"],
    ]);

    let table = extractor().extract(&source);

    assert_eq!(
        table.rows[0].get(CanonicalField::Remark),
        Some("기숙사 제공 셔틀 운행")
    );
}

#[test]
fn extract_maps_wrapped_header_labels() {
    let source = grid(&[
        &["국가명", "대학명\n(영문)", "어학\n성적"],
        &["독일", "TU Berlin", "EU_B2"],
    ]);

    let table = extractor().extract(&source);

    assert_eq!(
        table.header[1],
        ColumnLabel::Canonical(CanonicalField::NameEn)
    );
    assert_eq!(
        table.header[2],
        ColumnLabel::Canonical(CanonicalField::LanguageRequirementRaw)
    );
}

#[test]
fn extract_maps_condition_style_header_vocabulary() {
    let source = grid(&[
        &["국가", "대학명", "어학조건", "학점조건"],
        &["미국", "하버드대학교", "TOEFL 100", "3.0 이상"],
    ]);

    let table = extractor().extract(&source);
    assert!(!table.header_fallback);

    let cleaned = clean_rows(
        table.rows,
        &FileMetadata::default(),
        &NormalizeConfig::default(),
    );
    assert_eq!(cleaned.len(), 1);
    assert_eq!(cleaned[0].get(CanonicalField::Nation), Some("미국"));
    assert_eq!(cleaned[0].get(CanonicalField::NameKr), Some("하버드대학교"));
    assert_eq!(
        cleaned[0].get(CanonicalField::LanguageRequirementRaw),
        Some("TOEFL 100")
    );
    assert_eq!(cleaned[0].get(CanonicalField::MinGpaRaw), Some("3.0 이상"));
}

#[test]
fn extract_without_header_uses_synthetic_columns() {
    let source = grid(&[&["Alpha", "Beta"], &["1", "2"]]);

    let table = extractor().extract(&source);

    assert!(table.header_fallback);
    assert_eq!(table.header[0], ColumnLabel::Unmapped("col_0".to_string()));
    assert_eq!(table.header[1], ColumnLabel::Unmapped("col_1".to_string()));
    assert_eq!(table.rows.len(), 2);
}

#[test]
fn extract_pads_header_to_widest_data_row() {
    let source = grid(&[
        &["국가명", "대학명(한글)"],
        &["미국", "하버드대학교", "overflow"],
    ]);

    let table = extractor().extract(&source);

    assert_eq!(table.header.len(), 3);
    assert_eq!(
        table.header[2],
        ColumnLabel::Unmapped("unnamed_2".to_string())
    );
}

// --------------------------------------------------------------- inventory

#[test]
fn file_metadata_from_filename_patterns() {
    let metadata = FileMetadata::from_filename("2025-1 교환학생 모집 (3차).xlsx");
    assert_eq!(metadata.semester.as_deref(), Some("2025-1"));
    assert_eq!(metadata.recruitment_round.as_deref(), Some("3차"));

    let metadata = FileMetadata::from_filename("20242학기 지원가능대학.xlsx");
    assert_eq!(metadata.semester.as_deref(), Some("2024-2"));
    assert_eq!(metadata.recruitment_round, None);

    let metadata = FileMetadata::from_filename("파견대학 명단.xlsx");
    assert_eq!(metadata.semester, None);
    assert_eq!(metadata.recruitment_round, None);
}

// --------------------------------------------------------------- normalize

#[test]
fn clean_rows_forward_fills_merge_prone_columns() {
    let mut first = base_row("A대학", "A University", "미국");
    first.set(CanonicalField::ProgramType, "교환".to_string());
    let mut second = CanonicalRow::default();
    second.set(CanonicalField::NameKr, "B대학".to_string());
    second.set(CanonicalField::NameEn, "B University".to_string());
    let mut third = base_row("C대학", "C University", "일본");
    third.set(CanonicalField::ProgramType, "방문".to_string());

    let metadata = FileMetadata::default();
    let cleaned = clean_rows(
        vec![first, second, third],
        &metadata,
        &NormalizeConfig::default(),
    );

    assert_eq!(cleaned.len(), 3);
    assert_eq!(cleaned[1].get(CanonicalField::Nation), Some("미국"));
    assert_eq!(cleaned[1].get(CanonicalField::ProgramType), Some("교환"));
    assert_eq!(cleaned[2].get(CanonicalField::Nation), Some("일본"));
}

#[test]
fn clean_rows_drops_summary_and_excluded_rows() {
    let data = base_row("서울대학교", "Seoul National University", "한국");
    let summary = base_row("합계 120개교", "", "");
    let mut consortium = base_row("ISEP대학", "ISEP University", "미국");
    consortium.set(CanonicalField::InstitutionBadge, "SAF".to_string());

    let config = NormalizeConfig {
        excluded_institutions: vec!["SAF".to_string(), "ACUCA".to_string()],
    };
    let cleaned = clean_rows(
        vec![data, summary, consortium],
        &FileMetadata::default(),
        &config,
    );

    assert_eq!(cleaned.len(), 1);
    assert_eq!(
        cleaned[0].get(CanonicalField::NameEn),
        Some("Seoul National University")
    );
}

#[test]
fn clean_rows_stamps_metadata_and_trims_cells() {
    let mut row = base_row("  연세 대학교  ", "Yonsei University", "한국");
    row.set(CanonicalField::Remark, "  기숙사   제공  ".to_string());

    let metadata = FileMetadata::from_filename("2024-2 모집.xlsx");
    let cleaned = clean_rows(vec![row], &metadata, &NormalizeConfig::default());

    assert_eq!(cleaned.len(), 1);
    assert_eq!(cleaned[0].get(CanonicalField::Semester), Some("2024-2"));
    assert_eq!(
        cleaned[0].get(CanonicalField::RecruitmentRound),
        Some("Unknown")
    );
    assert_eq!(cleaned[0].get(CanonicalField::NameKr), Some("연세 대학교"));
    assert_eq!(cleaned[0].get(CanonicalField::Remark), Some("기숙사 제공"));
}

#[test]
fn clean_rows_drops_rows_without_korean_name() {
    let mut row = CanonicalRow::default();
    row.set(CanonicalField::NameEn, "Nameless University".to_string());

    let cleaned = clean_rows(
        vec![row],
        &FileMetadata::default(),
        &NormalizeConfig::default(),
    );
    assert!(cleaned.is_empty());
}

// --------------------------------------------------------------- standards

#[test]
fn legacy_hyphenated_codes_normalize() {
    assert_eq!(normalize_legacy_code("A-2"), "A2");
    assert_eq!(normalize_legacy_code("E-3"), "E3");
    assert_eq!(normalize_legacy_code("EU_B2"), "EU_B2");
}

#[test]
fn standards_table_lookup() {
    let standard = standard_for("A2").unwrap();
    assert_eq!(standard.scores.len(), 4);
    assert!(standard_for("Z9").is_none());
}

// ------------------------------------------------------------ requirements

#[test]
fn parse_absent_and_waived_requirements() {
    let parser = parser();

    assert_eq!(parser.parse(None, None).status, RequirementStatus::Absent);
    assert_eq!(
        parser.parse(Some("   "), None).status,
        RequirementStatus::Absent
    );
    assert_eq!(
        parser.parse(Some("어학성적 없음"), None).status,
        RequirementStatus::Waived
    );
    assert_eq!(
        parser.parse(Some("면제"), None).status,
        RequirementStatus::Waived
    );
    assert_eq!(
        parser.parse(Some("불필요"), None).status,
        RequirementStatus::Waived
    );
    assert_eq!(
        parser.parse(Some("N/A"), None).status,
        RequirementStatus::Waived
    );
}

#[test]
fn parse_expands_coded_tier_to_exam_minimums() {
    let parsed = parser().parse(Some("A2"), None);

    assert_eq!(parsed.status, RequirementStatus::Stated);
    assert_eq!(parsed.scores.len(), 4);

    let toefl = parsed.score_for(ExamType::Toefl).unwrap();
    assert_eq!(toefl.min_score, 80.0);
    assert_eq!(toefl.level_code.as_deref(), Some("A2"));
    assert_eq!(toefl.source, ScoreSource::Code);

    assert_eq!(parsed.score_for(ExamType::Ielts).unwrap().min_score, 6.0);
    assert_eq!(parsed.score_for(ExamType::Toeic).unwrap().min_score, 850.0);
    assert_eq!(
        parsed.score_for(ExamType::ToeflItp).unwrap().min_score,
        560.0
    );
}

#[test]
fn parse_legacy_hyphen_code_matches_current_tier() {
    let parsed = parser().parse(Some("A-2"), None);
    assert_eq!(parsed.scores.len(), 4);
    assert_eq!(
        parsed.score_for(ExamType::Toefl).unwrap().level_code.as_deref(),
        Some("A2")
    );
}

#[test]
fn parse_inline_exclusion_suppresses_expanded_exam() {
    let parsed = parser().parse(Some("A2 (TOEIC 제외)"), None);

    assert!(parsed.excluded_tests.contains(&ExamType::Toeic));
    assert_eq!(parsed.scores.len(), 3);
    assert!(parsed.score_for(ExamType::Toeic).is_none());
    assert!(parsed.score_for(ExamType::Toefl).is_some());
}

#[test]
fn parse_direct_score_overrides_coded_default() {
    let parsed = parser().parse(Some("A2, TOEFL 90"), None);

    let toefl = parsed.score_for(ExamType::Toefl).unwrap();
    assert_eq!(toefl.min_score, 90.0);
    assert_eq!(toefl.source, ScoreSource::DirectOverride);
    assert_eq!(toefl.level_code.as_deref(), Some("A2"));

    let toeic = parsed.score_for(ExamType::Toeic).unwrap();
    assert_eq!(toeic.min_score, 850.0);
    assert_eq!(toeic.source, ScoreSource::Code);
}

#[test]
fn parse_direct_scores_without_codes() {
    let parsed = parser().parse(Some("TOEFL 80 또는 IELTS 6.0"), None);

    assert_eq!(parsed.scores.len(), 2);
    let toefl = parsed.score_for(ExamType::Toefl).unwrap();
    assert_eq!(toefl.min_score, 80.0);
    assert_eq!(toefl.source, ScoreSource::Direct);
    assert_eq!(toefl.level_code, None);
    assert_eq!(parsed.score_for(ExamType::Ielts).unwrap().min_score, 6.0);
}

#[test]
fn parse_korean_exam_spellings() {
    let parsed = parser().parse(Some("토익 850 이상"), None);
    assert_eq!(parsed.score_for(ExamType::Toeic).unwrap().min_score, 850.0);

    let parsed = parser().parse(Some("토플 79"), None);
    assert_eq!(parsed.score_for(ExamType::Toefl).unwrap().min_score, 79.0);
}

#[test]
fn parse_jlpt_level_number() {
    let parsed = parser().parse(Some("JLPT N2 이상"), None);
    assert_eq!(parsed.score_for(ExamType::Jlpt).unwrap().min_score, 2.0);
}

#[test]
fn parse_letter_graded_exam_keeps_grade_as_level_code() {
    let parsed = parser().parse(Some("DELF B2"), None);

    let delf = parsed.score_for(ExamType::Delf).unwrap();
    assert_eq!(delf.min_score, 2.0);
    assert_eq!(delf.level_code.as_deref(), Some("B2"));
    assert_eq!(delf.source, ScoreSource::Direct);
}

#[test]
fn parse_bare_b_code_steers_by_region() {
    let parser = parser();

    // Default reading: Chinese proficiency tier.
    let chinese = parser.parse(Some("B2"), None);
    assert_eq!(chinese.scores.len(), 1);
    let hsk = chinese.score_for(ExamType::Hsk).unwrap();
    assert_eq!(hsk.min_score, 5.0);
    assert_eq!(hsk.level_code.as_deref(), Some("CN_B2"));

    // European placement flips the same code to the CEFR-derived table.
    let european = parser.parse(Some("B2"), Some("유럽"));
    assert!(european.score_for(ExamType::Hsk).is_none());
    assert_eq!(european.score_for(ExamType::Toefl).unwrap().min_score, 72.0);
    assert_eq!(european.score_for(ExamType::Toeic).unwrap().min_score, 785.0);
}

#[test]
fn parse_bare_c_code_defaults_to_japanese() {
    let parsed = parser().parse(Some("C1"), None);

    assert_eq!(parsed.score_for(ExamType::Jlpt).unwrap().min_score, 1.0);
    assert_eq!(parsed.score_for(ExamType::Jpt).unwrap().min_score, 900.0);
}

#[test]
fn parse_explicit_eu_code_ignores_region() {
    let parsed = parser().parse(Some("EU_C1"), None);

    assert_eq!(parsed.score_for(ExamType::Toefl).unwrap().min_score, 95.0);
    assert_eq!(parsed.score_for(ExamType::Ielts).unwrap().min_score, 7.0);
}

#[test]
fn parse_first_code_wins_for_shared_exams() {
    // A1 is matched before A3; both expand TOEFL, the earlier one holds.
    let parsed = parser().parse(Some("A1 또는 A3"), None);
    assert_eq!(parsed.score_for(ExamType::Toefl).unwrap().min_score, 85.0);
}

#[test]
fn exclusion_note_scan_collects_exam_names() {
    let parser = parser();

    let excluded = parser.parse_exclusions(Some("어학성적 TOEIC, ITP 제외"));
    assert!(excluded.contains(&ExamType::Toeic));
    assert!(excluded.contains(&ExamType::ToeflItp));
    assert_eq!(excluded.len(), 2);

    let excluded = parser.parse_exclusions(Some("TOEFL ITP 제외"));
    assert_eq!(excluded.len(), 1);
    assert!(excluded.contains(&ExamType::ToeflItp));

    let excluded = parser.parse_exclusions(Some("TOEIC/IELTS 불가"));
    assert!(excluded.contains(&ExamType::Toeic));
    assert!(excluded.contains(&ExamType::Ielts));
}

#[test]
fn exclusion_note_scan_stops_at_unrelated_korean_prose() {
    let excluded = parser().parse_exclusions(Some("TOEIC 점수는 인정. 기숙사 제공 불가"));
    assert!(excluded.is_empty());

    let excluded = parser().parse_exclusions(Some("숙소 제공 불가"));
    assert!(excluded.is_empty());
}

#[test]
fn exclusion_note_scan_respects_window() {
    let padding = "x".repeat(60);
    let note = format!("TOEIC {padding} 제외");
    assert!(parser().parse_exclusions(Some(&note)).is_empty());
}

// ------------------------------------------------------------------ fields

#[test]
fn parse_gpa_accepts_only_plausible_values() {
    let parsers = FieldParsers::new().unwrap();

    assert_eq!(parsers.parse_gpa(Some("3.0 이상")), Some(3.0));
    assert_eq!(parsers.parse_gpa(Some("GPA 2.5/4.5")), Some(2.5));
    assert_eq!(parsers.parse_gpa(Some("97")), None);
    assert_eq!(parsers.parse_gpa(Some("0.5")), None);
    assert_eq!(parsers.parse_gpa(Some("성적 우수자")), None);
    assert_eq!(parsers.parse_gpa(None), None);
}

#[test]
fn parse_website_url_variants() {
    let parsers = FieldParsers::new().unwrap();

    assert_eq!(
        parsers.parse_website_url(Some("https://example.edu/intl 참고")),
        Some("https://example.edu/intl".to_string())
    );
    assert_eq!(
        parsers.parse_website_url(Some("www.keio.ac.jp")),
        Some("http://www.keio.ac.jp".to_string())
    );
    assert_eq!(
        parsers.parse_website_url(Some("exchange.keio.ac.jp")),
        Some("http://exchange.keio.ac.jp".to_string())
    );
    assert_eq!(parsers.parse_website_url(Some("3.0")), None);
    assert_eq!(parsers.parse_website_url(Some("홈페이지 참조")), None);
}

#[test]
fn parse_review_flag_and_year() {
    let parsers = FieldParsers::new().unwrap();

    assert_eq!(
        parsers.parse_review(Some("Y(2013-2019)")),
        (true, Some("2013-2019".to_string()))
    );
    assert_eq!(
        parsers.parse_review(Some("2021")),
        (true, Some("2021".to_string()))
    );
    assert_eq!(parsers.parse_review(Some("있음")), (true, None));
    assert_eq!(parsers.parse_review(Some("X")), (false, None));
    assert_eq!(parsers.parse_review(Some("-")), (false, None));
    assert_eq!(parsers.parse_review(Some("아니오")), (false, None));
    assert_eq!(parsers.parse_review(None), (false, None));
}

// -------------------------------------------------------------------- load

#[test]
fn region_fallback_table() {
    assert_eq!(region_for_nation("미국"), Some("북미"));
    assert_eq!(region_for_nation("독일"), Some("유럽"));
    assert_eq!(region_for_nation("아틀란티스"), None);
}

#[test]
fn loader_inserts_university_with_requirements() {
    let mut connection = test_connection();
    let loader = Loader::new().unwrap();

    let mut row = base_row("스탠포드대학교", "Stanford University", "미국");
    row.set(CanonicalField::Semester, "2024-2".to_string());
    row.set(CanonicalField::ProgramType, "일반교환".to_string());
    row.set(CanonicalField::LanguageRequirementRaw, "A2".to_string());
    row.set(CanonicalField::MinGpaRaw, "3.0 이상".to_string());

    let tx = connection.transaction().unwrap();
    let stats = loader.load_rows(&tx, std::slice::from_ref(&row)).unwrap();
    tx.commit().unwrap();

    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.requirements, 4);

    let (region, min_gpa, is_exchange): (String, Option<f64>, bool) = connection
        .query_row(
            "SELECT region, min_gpa, is_exchange FROM university WHERE name_en = ?1",
            ["Stanford University"],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(region, "북미");
    assert_eq!(min_gpa, Some(3.0));
    assert!(is_exchange);
}

#[test]
fn loader_updates_existing_and_merges_semesters() {
    let mut connection = test_connection();
    let loader = Loader::new().unwrap();

    let mut first = base_row("게이오대학", "Keio University", "일본");
    first.set(CanonicalField::Semester, "2024-2".to_string());
    first.set(CanonicalField::LanguageRequirementRaw, "A2".to_string());

    let tx = connection.transaction().unwrap();
    loader.load_rows(&tx, std::slice::from_ref(&first)).unwrap();
    tx.commit().unwrap();

    let mut second = base_row("게이오대학", "Keio University", "일본");
    second.set(CanonicalField::Semester, "2025-1".to_string());
    second.set(CanonicalField::LanguageRequirementRaw, "TOEFL 90".to_string());

    let tx = connection.transaction().unwrap();
    let stats = loader.load_rows(&tx, std::slice::from_ref(&second)).unwrap();
    tx.commit().unwrap();

    assert_eq!(stats.inserted, 0);
    assert_eq!(stats.updated, 1);

    let semester: String = connection
        .query_row(
            "SELECT semester FROM university WHERE name_en = ?1",
            ["Keio University"],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(semester, "2025-1, 2024-2");

    // The second statement replaces the requirement set outright.
    let requirement_count: i64 = connection
        .query_row("SELECT COUNT(*) FROM language_requirement", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(requirement_count, 1);
}

#[test]
fn loader_keeps_requirements_on_waiver_text() {
    let mut connection = test_connection();
    let loader = Loader::new().unwrap();

    let mut first = base_row("빈대학교", "University of Vienna", "오스트리아");
    first.set(CanonicalField::LanguageRequirementRaw, "EU_B2".to_string());

    let tx = connection.transaction().unwrap();
    loader.load_rows(&tx, std::slice::from_ref(&first)).unwrap();
    tx.commit().unwrap();

    let mut second = base_row("빈대학교", "University of Vienna", "오스트리아");
    second.set(CanonicalField::LanguageRequirementRaw, "면제".to_string());

    let tx = connection.transaction().unwrap();
    let stats = loader.load_rows(&tx, std::slice::from_ref(&second)).unwrap();
    tx.commit().unwrap();
    assert_eq!(stats.updated, 1);

    let requirement_count: i64 = connection
        .query_row("SELECT COUNT(*) FROM language_requirement", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(requirement_count, 3);
}

#[test]
fn loader_marks_note_excluded_exams_unavailable() {
    let mut connection = test_connection();
    let loader = Loader::new().unwrap();

    let mut row = base_row("미시간대학교", "University of Michigan", "미국");
    row.set(CanonicalField::LanguageRequirementRaw, "A2".to_string());
    row.set(
        CanonicalField::SignificantNote,
        "TOEFL ITP 제외".to_string(),
    );

    let tx = connection.transaction().unwrap();
    let stats = loader.load_rows(&tx, std::slice::from_ref(&row)).unwrap();
    tx.commit().unwrap();
    assert_eq!(stats.requirements, 4);

    let itp_available: bool = connection
        .query_row(
            "SELECT is_available FROM language_requirement WHERE exam_type = 'TOEFL_ITP'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(!itp_available);

    let toefl_available: bool = connection
        .query_row(
            "SELECT is_available FROM language_requirement WHERE exam_type = 'TOEFL'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(toefl_available);
}

#[test]
fn loader_skips_rows_without_identity() {
    let mut connection = test_connection();
    let loader = Loader::new().unwrap();

    let mut row = CanonicalRow::default();
    row.set(CanonicalField::NameKr, "이름만대학".to_string());

    let tx = connection.transaction().unwrap();
    let stats = loader.load_rows(&tx, std::slice::from_ref(&row)).unwrap();
    tx.commit().unwrap();

    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.inserted, 0);
}

#[test]
fn loader_reparses_consistently_across_runs() {
    // Same input twice must converge to the same stored state.
    let mut connection = test_connection();
    let loader = Loader::new().unwrap();

    let mut row = base_row("취리히대학교", "University of Zurich", "스위스");
    row.set(CanonicalField::Semester, "2025-1".to_string());
    row.set(CanonicalField::LanguageRequirementRaw, "EU_C1".to_string());

    for _ in 0..2 {
        let tx = connection.transaction().unwrap();
        loader.load_rows(&tx, std::slice::from_ref(&row)).unwrap();
        tx.commit().unwrap();
    }

    let (count, semester): (i64, String) = connection
        .query_row(
            "SELECT COUNT(*), semester FROM university WHERE name_en = ?1",
            ["University of Zurich"],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(semester, "2025-1");

    let parsed = loader
        .requirement_parser()
        .parse(Some("EU_C1"), Some("유럽"));
    let requirement_count: i64 = connection
        .query_row("SELECT COUNT(*) FROM language_requirement", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(requirement_count, parsed.scores.len() as i64);
}

// ---------------------------------------------------------------- db_setup

#[test]
fn ensure_schema_is_idempotent_and_versioned() {
    let connection = Connection::open_in_memory().unwrap();
    ensure_schema(&connection).unwrap();
    ensure_schema(&connection).unwrap();

    let version: String = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = 'db_schema_version'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(version, super::DB_SCHEMA_VERSION);
}
