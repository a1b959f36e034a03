//! Parsing of the DPV Neuquén daily road report and query answering.
//!
//! The report is plain text extracted from a PDF. Route codes look like
//! `P013` or `N040`; each route's block runs from its code to the next code
//! (or the end of the text).

use std::sync::LazyLock;

use regex_lite::Regex;

const ALL_ROUTES_QUERY: &str = "rutas disponibles";
const SUMMARY_LEN: usize = 100;
const CANDIDATE_SUMMARY_LEN: usize = 80;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Información Actualizada a las\s+([\d:]+hs\.)\s+del\s+(\d{2}/\d{2}/\d{4})")
        .expect("header pattern is valid")
});

static ROUTE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[PN]\d{3}").expect("route code pattern is valid"));

/// A parsed report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteReport {
    /// `(time, date)` from the report header, e.g. `("08:30hs.", "17/10/2026")`.
    pub updated_at: Option<(String, String)>,
    /// Routes in order of first appearance.
    pub routes: Vec<RouteEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteEntry {
    pub code: String,
    /// Text following the code, trimmed.
    pub detail: String,
}

impl RouteEntry {
    /// The whole block as shown to the model.
    pub fn block(&self) -> String {
        if self.detail.is_empty() {
            self.code.clone()
        } else {
            format!("{} {}", self.code, self.detail)
        }
    }

    fn summary(&self, max_chars: usize) -> String {
        if self.detail.chars().count() > max_chars {
            let cut: String = self.detail.chars().take(max_chars).collect();
            format!("{cut}...")
        } else {
            self.detail.clone()
        }
    }
}

impl RouteReport {
    pub fn route(&self, code: &str) -> Option<&RouteEntry> {
        self.routes.iter().find(|r| r.code == code)
    }

    fn header(&self) -> String {
        match &self.updated_at {
            Some((time, date)) => format!("Última actualización: {time} {date}\n\n"),
            None => String::new(),
        }
    }

    fn sorted(&self) -> Vec<&RouteEntry> {
        let mut routes: Vec<&RouteEntry> = self.routes.iter().collect();
        routes.sort_by(|a, b| a.code.cmp(&b.code));
        routes
    }

    fn detail_answer(&self, entry: &RouteEntry) -> String {
        format!(
            "{}Información para la ruta {}:\n{}",
            self.header(),
            entry.code,
            entry.block()
        )
    }

    fn listing(&self, title: &str, routes: &[&RouteEntry], max_chars: usize) -> Vec<String> {
        let mut lines = vec![format!("{}{title}", self.header())];
        lines.extend(
            routes
                .iter()
                .map(|r| format!("- {}: {}", r.code, r.summary(max_chars))),
        );
        lines
    }
}

/// Parse report text into header information and route blocks.
pub fn parse_report(text: &str) -> RouteReport {
    let updated_at = HEADER_RE
        .captures(text)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()));

    let positions: Vec<(usize, usize)> = ROUTE_CODE_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut routes: Vec<RouteEntry> = Vec::new();
    for (i, &(start, end)) in positions.iter().enumerate() {
        let code = &text[start..end];
        if routes.iter().any(|r| r.code == code) {
            continue;
        }
        let stop = positions.get(i + 1).map_or(text.len(), |&(next, _)| next);
        routes.push(RouteEntry {
            code: code.to_string(),
            detail: text[end..stop].trim().to_string(),
        });
    }

    RouteReport { updated_at, routes }
}

/// Answer a free-text query against a parsed report.
///
/// Resolution order: the full listing keyword, an explicit route code, then
/// routes whose block contains every query word.
pub fn answer_query(report: &RouteReport, query: &str) -> String {
    let query_lower = query.to_lowercase();

    if query_lower == ALL_ROUTES_QUERY {
        return report
            .listing(
                "Lista de todas las rutas disponibles:",
                &report.sorted(),
                SUMMARY_LEN,
            )
            .join("\n");
    }

    if let Some(entry) = report
        .routes
        .iter()
        .find(|r| query_lower.contains(&r.code.to_lowercase()))
    {
        return report.detail_answer(entry);
    }

    let words: Vec<&str> = query_lower.split_whitespace().collect();
    let matching: Vec<&RouteEntry> = report
        .routes
        .iter()
        .filter(|r| {
            let block = r.block().to_lowercase();
            words.iter().all(|w| block.contains(w))
        })
        .collect();

    match matching.as_slice() {
        [single] => report.detail_answer(single),
        [] => {
            let mut lines = report.listing(
                "Estado actual de las rutas en Neuquén:",
                &report.sorted(),
                SUMMARY_LEN,
            );
            lines.push(
                "\n¿Sobre cuál de estos tramos te gustaría información más detallada?".to_string(),
            );
            lines.join("\n")
        }
        several => {
            let mut lines = report.listing(
                "Encontré múltiples rutas que podrían corresponder:",
                several,
                CANDIDATE_SUMMARY_LEN,
            );
            lines.push("¿Podrías especificar cuál te interesa?".to_string());
            lines.join("\n")
        }
    }
}
