use anyhow::{Context, Result};
use regex::Regex;

/// 4.5-scale plausibility band: raw cells mix percentage-scale and
/// 4.0/4.5-scale entries, and a percentage must never land in the GPA field.
const GPA_MIN: f64 = 1.0;
const GPA_MAX: f64 = 5.0;

pub struct FieldParsers {
    gpa_number: Regex,
    url_with_prefix: Regex,
    url_bare_domain: Regex,
    review_year: Regex,
}

impl FieldParsers {
    pub fn new() -> Result<Self> {
        Ok(Self {
            gpa_number: Regex::new(r"(\d+(?:\.\d+)?)")
                .context("failed to compile GPA number pattern")?,
            url_with_prefix: Regex::new(r"(https?://|www\.)[^\s()\[\]{}]+")
                .context("failed to compile prefixed URL pattern")?,
            // Requires an alphabetic TLD so floating-point numbers never
            // look like domains.
            url_bare_domain: Regex::new(r"\b[a-zA-Z0-9-]+\.[a-zA-Z]{2,}(?:[/?#][^\s()\[\]{}]+)?")
                .context("failed to compile bare domain pattern")?,
            review_year: Regex::new(r"(20\d{2}(?:\s*-\s*20\d{2})?)")
                .context("failed to compile review year pattern")?,
        })
    }

    /// First numeral in the text, accepted only when plausible as a
    /// 4.5-scale GPA. "3.0 이상" -> 3.0; "97" (percentage) -> None.
    pub fn parse_gpa(&self, text: Option<&str>) -> Option<f64> {
        let text = text.map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return None;
        }

        let captures = self.gpa_number.captures(text)?;
        let gpa = captures[1].parse::<f64>().ok()?;

        if (GPA_MIN..=GPA_MAX).contains(&gpa) {
            Some(gpa)
        } else {
            None
        }
    }

    /// First URL-looking substring, protocol-prefixed for consistency.
    pub fn parse_website_url(&self, text: Option<&str>) -> Option<String> {
        let text = text.map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return None;
        }

        let matched = self
            .url_with_prefix
            .find(text)
            .or_else(|| self.url_bare_domain.find(text))?;

        let url = matched.as_str();
        if url.starts_with("http://") || url.starts_with("https://") {
            Some(url.to_string())
        } else {
            Some(format!("http://{url}"))
        }
    }

    /// Review availability plus the review year when one is stated.
    /// A year pattern anywhere wins over keyword checks.
    pub fn parse_review(&self, text: Option<&str>) -> (bool, Option<String>) {
        let text = text.map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return (false, None);
        }

        let upper = text.to_uppercase();
        if matches!(upper.as_str(), "X" | "N" | "NO" | "NONE" | "-") {
            return (false, None);
        }

        if let Some(captures) = self.review_year.captures(text) {
            return (true, Some(captures[1].trim().to_string()));
        }

        const POSITIVE_KEYWORDS: &[&str] =
            &["Y", "O", "YES", "TRUE", "AVAILABLE", "있음", "후기", "수기"];
        if POSITIVE_KEYWORDS
            .iter()
            .any(|keyword| upper.starts_with(keyword))
        {
            return (true, None);
        }

        (false, None)
    }
}
