use serde::Serialize;

/// Phonetic/test-family classification carried on every requirement row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LanguageGroup {
    English,
    Chinese,
    Japanese,
    French,
    German,
    Spanish,
    Italian,
    Korean,
}

impl LanguageGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::English => "ENGLISH",
            Self::Chinese => "CHINESE",
            Self::Japanese => "JAPANESE",
            Self::French => "FRENCH",
            Self::German => "GERMAN",
            Self::Spanish => "SPANISH",
            Self::Italian => "ITALIAN",
            Self::Korean => "KOREAN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ExamType {
    Toefl,
    ToeflItp,
    Toeic,
    Ielts,
    Duolingo,
    Hsk,
    Jlpt,
    Jpt,
    Delf,
    Zd,
    Dele,
    Celi,
    Cils,
    Topik,
}

impl ExamType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Toefl => "TOEFL",
            Self::ToeflItp => "TOEFL_ITP",
            Self::Toeic => "TOEIC",
            Self::Ielts => "IELTS",
            Self::Duolingo => "DUOLINGO",
            Self::Hsk => "HSK",
            Self::Jlpt => "JLPT",
            Self::Jpt => "JPT",
            Self::Delf => "DELF",
            Self::Zd => "ZD",
            Self::Dele => "DELE",
            Self::Celi => "CELI",
            Self::Cils => "CILS",
            Self::Topik => "TOPIK",
        }
    }

    /// Recognize an already-uppercased single token, e.g. from the
    /// exclusion-note scan or a CLI argument.
    pub fn from_token(token: &str) -> Option<Self> {
        let exam = match token {
            "TOEFL" | "TOEFL_IBT" | "IBT" => Self::Toefl,
            "TOEFL_ITP" | "ITP" => Self::ToeflItp,
            "TOEIC" => Self::Toeic,
            "IELTS" => Self::Ielts,
            "DUOLINGO" => Self::Duolingo,
            "HSK" => Self::Hsk,
            "JLPT" => Self::Jlpt,
            "JPT" => Self::Jpt,
            "DELF" => Self::Delf,
            "ZD" => Self::Zd,
            "DELE" => Self::Dele,
            "CELI" => Self::Celi,
            "CILS" => Self::Cils,
            "TOPIK" => Self::Topik,
            _ => return None,
        };
        Some(exam)
    }

    pub fn language_group(self) -> LanguageGroup {
        match self {
            Self::Toefl | Self::ToeflItp | Self::Toeic | Self::Ielts | Self::Duolingo => {
                LanguageGroup::English
            }
            Self::Hsk => LanguageGroup::Chinese,
            Self::Jlpt | Self::Jpt => LanguageGroup::Japanese,
            Self::Delf => LanguageGroup::French,
            Self::Zd => LanguageGroup::German,
            Self::Dele => LanguageGroup::Spanish,
            Self::Celi | Self::Cils => LanguageGroup::Italian,
            Self::Topik => LanguageGroup::Korean,
        }
    }
}

/// One coded proficiency tier: the code expands to a fixed per-exam minimum
/// set. 2024 institutional standards table.
#[derive(Debug, Clone, Copy)]
pub struct Standard {
    pub code: &'static str,
    pub group: LanguageGroup,
    pub scores: &'static [(ExamType, f64)],
}

pub const LANGUAGE_STANDARDS: &[Standard] = &[
    Standard {
        code: "A1",
        group: LanguageGroup::English,
        scores: &[
            (ExamType::Toefl, 85.0),
            (ExamType::Ielts, 6.5),
            (ExamType::Toeic, 900.0),
            (ExamType::ToeflItp, 600.0),
        ],
    },
    Standard {
        code: "A2",
        group: LanguageGroup::English,
        scores: &[
            (ExamType::Toefl, 80.0),
            (ExamType::Ielts, 6.0),
            (ExamType::Toeic, 850.0),
            (ExamType::ToeflItp, 560.0),
        ],
    },
    Standard {
        code: "A3",
        group: LanguageGroup::English,
        scores: &[
            (ExamType::Toefl, 75.0),
            (ExamType::Ielts, 5.5),
            (ExamType::Toeic, 800.0),
            (ExamType::ToeflItp, 545.0),
        ],
    },
    Standard {
        code: "A4",
        group: LanguageGroup::English,
        scores: &[
            (ExamType::Toefl, 70.0),
            (ExamType::Ielts, 5.0),
            (ExamType::Toeic, 750.0),
            (ExamType::ToeflItp, 530.0),
        ],
    },
    Standard {
        code: "A5",
        group: LanguageGroup::English,
        scores: &[
            (ExamType::Toefl, 60.0),
            (ExamType::Ielts, 4.5),
            (ExamType::Toeic, 700.0),
            (ExamType::ToeflItp, 515.0),
        ],
    },
    Standard {
        code: "EU_A2",
        group: LanguageGroup::English,
        scores: &[
            (ExamType::Toefl, 24.0),
            (ExamType::Ielts, 4.5),
            (ExamType::Toeic, 225.0),
        ],
    },
    Standard {
        code: "EU_B1",
        group: LanguageGroup::English,
        scores: &[
            (ExamType::Toefl, 44.0),
            (ExamType::Ielts, 5.5),
            (ExamType::Toeic, 550.0),
        ],
    },
    Standard {
        code: "EU_B2",
        group: LanguageGroup::English,
        scores: &[
            (ExamType::Toefl, 72.0),
            (ExamType::Ielts, 6.0),
            (ExamType::Toeic, 785.0),
        ],
    },
    Standard {
        code: "EU_C1",
        group: LanguageGroup::English,
        scores: &[
            (ExamType::Toefl, 95.0),
            (ExamType::Ielts, 7.0),
            (ExamType::Toeic, 945.0),
        ],
    },
    Standard {
        code: "EU_C2",
        group: LanguageGroup::English,
        scores: &[(ExamType::Toefl, 114.0), (ExamType::Ielts, 8.0)],
    },
    Standard {
        code: "D1",
        group: LanguageGroup::French,
        scores: &[(ExamType::Delf, 2.0)],
    },
    Standard {
        code: "D2",
        group: LanguageGroup::French,
        scores: &[(ExamType::Delf, 1.0)],
    },
    Standard {
        code: "D3",
        group: LanguageGroup::French,
        scores: &[(ExamType::Delf, 0.5)],
    },
    Standard {
        code: "E1",
        group: LanguageGroup::German,
        scores: &[(ExamType::Zd, 2.0)],
    },
    Standard {
        code: "E2",
        group: LanguageGroup::German,
        scores: &[(ExamType::Zd, 1.0)],
    },
    Standard {
        code: "E3",
        group: LanguageGroup::German,
        scores: &[(ExamType::Zd, 0.5)],
    },
    Standard {
        code: "CN_B1",
        group: LanguageGroup::Chinese,
        scores: &[(ExamType::Hsk, 6.0)],
    },
    Standard {
        code: "CN_B2",
        group: LanguageGroup::Chinese,
        scores: &[(ExamType::Hsk, 5.0)],
    },
    Standard {
        code: "CN_B3",
        group: LanguageGroup::Chinese,
        scores: &[(ExamType::Hsk, 4.0)],
    },
    Standard {
        code: "JP_C1",
        group: LanguageGroup::Japanese,
        scores: &[(ExamType::Jlpt, 1.0), (ExamType::Jpt, 900.0)],
    },
    Standard {
        code: "JP_C2",
        group: LanguageGroup::Japanese,
        scores: &[(ExamType::Jlpt, 2.0), (ExamType::Jpt, 600.0)],
    },
];

pub fn standard_for(code: &str) -> Option<&'static Standard> {
    LANGUAGE_STANDARDS
        .iter()
        .find(|standard| standard.code == code)
}

/// Older exports wrote tier codes with a hyphen ("A-2"); normalize to the
/// current form before lookup.
pub const LEGACY_CODE_ALIASES: &[(&str, &str)] = &[
    ("A-1", "A1"),
    ("A-2", "A2"),
    ("A-3", "A3"),
    ("A-4", "A4"),
    ("A-5", "A5"),
    ("B-1", "B1"),
    ("B-2", "B2"),
    ("B-3", "B3"),
    ("C-1", "C1"),
    ("C-2", "C2"),
    ("D-1", "D1"),
    ("D-2", "D2"),
    ("D-3", "D3"),
    ("E-1", "E1"),
    ("E-2", "E2"),
    ("E-3", "E3"),
];

pub fn normalize_legacy_code(code: &str) -> String {
    for (legacy, current) in LEGACY_CODE_ALIASES {
        if code == *legacy {
            return (*current).to_string();
        }
    }
    code.to_string()
}

/// CEFR-style letter grades mapped to the ordinal score scale used for
/// DELF/ZD requirement rows.
pub fn cefr_to_score(level: &str) -> Option<f64> {
    match level.to_uppercase().as_str() {
        "A1" => Some(0.25),
        "A2" => Some(0.5),
        "B1" => Some(1.0),
        "B2" => Some(2.0),
        "C1" => Some(3.0),
        "C2" => Some(4.0),
        _ => None,
    }
}

/// DELE diplomas rank downward: a lower ordinal means a higher level.
pub fn dele_to_score(level: &str) -> Option<f64> {
    match level.to_uppercase().as_str() {
        "A1" => Some(6.0),
        "A2" => Some(5.0),
        "B1" => Some(4.0),
        "B2" => Some(3.0),
        "C1" => Some(2.0),
        "C2" => Some(1.0),
        _ => None,
    }
}

pub fn italian_cefr_to_score(level: &str) -> Option<f64> {
    match level.to_uppercase().as_str() {
        "A1" => Some(1.0),
        "A2" => Some(2.0),
        "B1" => Some(3.0),
        "B2" => Some(4.0),
        "C1" => Some(5.0),
        "C2" => Some(6.0),
        _ => None,
    }
}
