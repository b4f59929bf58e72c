//! Linguistic scoring of candidates.
//!
//! Scores are intentionally small numbers centred on word count; they only
//! need to rank candidates against each other. Hook detection looks at the
//! opening of the candidate for the attention patterns that travel well on
//! social media.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::types::{Candidate, HOOK_MIN_SCORE};

/// Chars of normalised text examined for hook signals.
const HOOK_HEAD_CHARS: usize = 150;

static RHETORICAL_QUESTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(que|como|por que|porque)\b").unwrap());

static STATISTIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\s*%|\b\d+\s+de\s+cada\s+\d+\b").unwrap());

static IMPACT_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(increible|sorprendente|nunca|siempre|todos|nadie|secreto|verdad|descubre)\b")
        .unwrap()
});

static IMPERATIVE_OPENING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(imagina|piensa|considera|mira|escucha|recuerda)\b").unwrap());

static CONTRAST_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(pero|sin embargo|aunque|a pesar de)\b").unwrap());

/// Score every candidate in place: working score, hook score and rationale.
pub fn score_candidates(candidates: &mut [Candidate]) {
    for candidate in candidates {
        score_candidate(candidate);
    }
}

fn score_candidate(candidate: &mut Candidate) {
    let word_count = candidate.text.split_whitespace().count();

    let text_penalty = if word_count < 8 {
        2.0
    } else if word_count < 15 {
        1.0
    } else {
        0.0
    };
    let gap_penalty = (candidate.gap_ms as f64 / 3000.0).min(2.0);

    let hook = hook_score(&candidate.text);
    let hook_bonus = if hook >= HOOK_MIN_SCORE { 1.5 * hook } else { 0.0 };

    let start_bonus = if candidate.start_clean { 0.3 } else { -0.3 };
    let end_bonus = if candidate.end_clean { 0.6 } else { -0.6 };

    let score =
        word_count as f64 / 10.0 + hook_bonus + start_bonus + end_bonus - text_penalty - gap_penalty;

    candidate.hook_score = hook;
    candidate.heuristic_score = score;
    candidate.score = score;
    candidate.rationale = format!(
        "words={} gap_ms={} hook={:.2} start_clean={} end_clean={}",
        word_count, candidate.gap_ms, hook, candidate.start_clean, candidate.end_clean
    );
}

/// Estimate how well the opening captures attention, in [0, 1].
pub fn hook_score(text: &str) -> f64 {
    let head: String = normalize(text).chars().take(HOOK_HEAD_CHARS).collect();
    if head.is_empty() {
        return 0.0;
    }

    let mut score: f64 = 0.0;

    // Rhetorical or direct question
    if head.contains('?') || RHETORICAL_QUESTION.is_match(&head) {
        score += 0.35;
    }

    // Statistics: percentages or "X de cada Y"
    if STATISTIC.is_match(&head) {
        score += 0.25;
    }

    if IMPACT_WORD.is_match(&head) {
        score += 0.20;
    }

    if IMPERATIVE_OPENING.is_match(head.trim_start()) {
        score += 0.15;
    }

    if CONTRAST_WORD.is_match(&head) {
        score += 0.10;
    }

    // A substantial exclamation right at the opening
    if let Some(pos) = head.chars().position(|c| c == '!') {
        if pos > 10 {
            score += 0.15;
        }
    }

    // Punchy opening
    if head.split_whitespace().count() <= 8 {
        score += 0.10;
    }

    score.min(1.0)
}

/// NFKD-decompose, drop combining marks, lowercase. Leaves plain ASCII for
/// the Spanish pattern tables regardless of accents in the transcript.
fn normalize(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn candidate(text: &str, gap_ms: i64, start_clean: bool, end_clean: bool) -> Candidate {
        Candidate {
            start_idx: 0,
            end_idx: 0,
            start_ms: 0,
            end_ms: 60_000,
            gap_ms,
            start_clean,
            end_clean,
            text: text.to_string(),
            hook_score: 0.0,
            heuristic_score: 0.0,
            rationale: String::new(),
            semantic_type: None,
            type_score: None,
            centroid: None,
            llm_score: None,
            llm_reason: None,
            llm_trim: None,
            llm_trim_confidence: None,
            trim_applied: false,
            score: 0.0,
        }
    }

    #[test]
    fn test_normalize_strips_accents() {
        assert_eq!(normalize("¿Por QUÉ será?"), "¿por que sera?");
    }

    #[rstest]
    #[case("¿Por qué seguimos cargando esa culpa cada mañana sin descanso?", 0.35)]
    #[case("El 90% de nosotros ha sentido ese vacio alguna vez en la vida", 0.25)]
    #[case("9 de cada 10 personas esconden la misma herida sin decirlo nunca", 0.45)]
    #[case("Nadie te lo va a decir de esta manera tan directa hoy dia", 0.20)]
    #[case("Imagina por un momento entregar esa carga tan pesada de verdad", 0.35)]
    #[case("Sin embargo la gracia llega cuando menos la esperamos nosotros", 0.10)]
    fn test_hook_signals(#[case] text: &str, #[case] expected: f64) {
        assert!(
            (hook_score(text) - expected).abs() < 1e-9,
            "text {text:?} scored {} instead of {expected}",
            hook_score(text)
        );
    }

    #[test]
    fn test_hook_word_boundaries() {
        // "espero" contains "pero" and "verdadero" contains "verdad"; neither
        // should fire without a word boundary.
        assert_eq!(
            hook_score("espero encontrar un camino verdadero entre tantas dudas humanas"),
            0.0
        );
    }

    #[test]
    fn test_hook_exclamation_and_short_head() {
        // Long exclamation (0.15) + head of eight words or fewer (0.10).
        let score = hook_score("Dios nunca abandona a sus hijos!");
        assert!((score - (0.20 + 0.15 + 0.10)).abs() < 1e-9);

        // A bare interjection is too short for the exclamation signal.
        assert!((hook_score("Amen!") - 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_hook_score_is_capped_at_one() {
        let loaded =
            "¿Sabias que el 90% nunca descubre el secreto? Imagina eso, pero hoy todos podemos!";
        let score = hook_score(loaded);
        assert!(score <= 1.0);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_components() {
        let mut c = candidate(
            "Una reflexion breve donde apenas llegamos a contar palabras en total aqui mismo.",
            0,
            true,
            true,
        );
        score_candidates(std::slice::from_mut(&mut c));

        // 13 words: 1.3 base, -1.0 short-text penalty, +0.3 +0.6 bonuses,
        // no hook (sum below the qualifying threshold).
        assert!(c.hook_score < HOOK_MIN_SCORE);
        assert!((c.heuristic_score - (1.3 - 1.0 + 0.3 + 0.6)).abs() < 1e-9);
        assert_eq!(c.score, c.heuristic_score);
        assert!(c.rationale.contains("words=13"));
        assert!(c.rationale.contains("start_clean=true"));
    }

    #[test]
    fn test_gap_penalty_is_capped() {
        let mut dirty = candidate("corto", 20_000, false, false);
        score_candidates(std::slice::from_mut(&mut dirty));

        // 1 word: 0.1 base, -2.0 text penalty, -0.3 -0.6 bonuses, -2.0
        // capped gap penalty.
        assert!((dirty.heuristic_score - (0.1 - 2.0 - 0.3 - 0.6 - 2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_qualified_hook_earns_bonus() {
        let mut hooked = candidate(
            "¿Por que el sufrimiento nos alcanza a todos sin avisar jamas en la vida diaria?",
            0,
            true,
            true,
        );
        score_candidates(std::slice::from_mut(&mut hooked));

        assert!(hooked.hook_score >= HOOK_MIN_SCORE);
        let word_count = hooked.text.split_whitespace().count() as f64;
        let expected = word_count / 10.0 + 1.5 * hooked.hook_score + 0.3 + 0.6;
        assert!((hooked.heuristic_score - expected).abs() < 1e-9);
    }
}
