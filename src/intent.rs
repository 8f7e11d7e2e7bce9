//! Intent rules: classify an utterance and pick a reply.
//!
//! Rules are checked in order and the first match wins. Replies are fixed
//! text so the same input and profile always produce the same answer.

use aria_adaptation::{InteractionKind, UserProfile};
use aria_core::tokenize;

/// An utterance prepared for matching.
pub struct Utterance<'a> {
    pub raw: &'a str,
    tokens: Vec<String>,
    padded: String,
}

impl<'a> Utterance<'a> {
    pub fn new(raw: &'a str) -> Self {
        let tokens = tokenize(raw);
        let padded = format!(" {} ", tokens.join(" "));
        Self { raw, tokens, padded }
    }

    pub fn has_word(&self, word: &str) -> bool {
        self.tokens.iter().any(|t| t == word)
    }

    /// Match normalized words or phrases ("buenos dias" matches "Buenos días").
    pub fn has_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| {
            if p.contains(' ') {
                self.padded.contains(&format!(" {} ", p))
            } else {
                self.has_word(p)
            }
        })
    }

    pub fn is_question(&self) -> bool {
        self.raw.contains('?') || self.raw.contains('¿')
    }
}

type Predicate = Box<dyn Fn(&Utterance<'_>) -> bool + Send + Sync>;
type Responder = Box<dyn Fn(&Utterance<'_>, Option<&UserProfile>) -> String + Send + Sync>;

pub struct IntentRule {
    pub name: &'static str,
    /// Interaction kind this rule implies, if any.
    pub kind: Option<InteractionKind>,
    matches: Predicate,
    respond: Responder,
}

impl IntentRule {
    pub fn new<P, R>(name: &'static str, kind: Option<InteractionKind>, matches: P, respond: R) -> Self
    where
        P: Fn(&Utterance<'_>) -> bool + Send + Sync + 'static,
        R: Fn(&Utterance<'_>, Option<&UserProfile>) -> String + Send + Sync + 'static,
    {
        Self {
            name,
            kind,
            matches: Box::new(matches),
            respond: Box::new(respond),
        }
    }
}

pub struct IntentTable {
    rules: Vec<IntentRule>,
}

const GREETINGS: &[&str] = &["hola", "buenos dias", "buenas tardes", "buenas noches", "hello"];
const WELLBEING: &[&str] = &["como estas", "que tal", "how are you"];
const FAREWELLS: &[&str] = &["adios", "chao", "hasta luego", "hasta pronto", "bye"];

impl Default for IntentTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.push(IntentRule::new(
            "farewell",
            Some(InteractionKind::Farewell),
            |u| u.has_any(FAREWELLS),
            |_, _| "¡Hasta pronto! Ha sido un placer conversar contigo.".to_string(),
        ));
        table.push(IntentRule::new(
            "wellbeing",
            Some(InteractionKind::Question),
            |u| u.has_any(WELLBEING),
            |_, profile| match profile {
                Some(p) if p.stats.interaction_count > 1 => {
                    "¡Muy bien! Cada vez aprendo más de nuestras conversaciones.".to_string()
                }
                _ => "¡Estoy muy bien! ¿Y tú cómo te encuentras?".to_string(),
            },
        ));
        table.push(IntentRule::new(
            "greeting",
            Some(InteractionKind::Greeting),
            |u| u.has_any(GREETINGS),
            |_, profile| match profile {
                Some(p) if p.stats.interaction_count > 1 => {
                    "¡Hola! Me alegra mucho volver a hablar contigo.".to_string()
                }
                _ => "¡Hola! Me alegra conocerte. ¿Cómo estás?".to_string(),
            },
        ));
        table.push(IntentRule::new(
            "topic_follow_up",
            None,
            |_| true,
            |_, profile| match profile.and_then(|p| p.top_topic()) {
                Some((topic, _)) => format!(
                    "¡Qué interesante! ¿Te gustaría explorar cómo se relaciona esto con {}?",
                    topic
                ),
                None => "Interesante lo que dices. ¿Te gustaría contarme más al respecto?"
                    .to_string(),
            },
        ));
        table
    }
}

impl IntentTable {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn push(&mut self, rule: IntentRule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn matching(&self, utterance: &Utterance<'_>) -> Option<&IntentRule> {
        self.rules.iter().find(|r| (r.matches)(utterance))
    }

    /// Interaction kind for `text`: the first matching rule's kind, otherwise
    /// question or declaration by punctuation.
    pub fn classify(&self, text: &str) -> InteractionKind {
        let utterance = Utterance::new(text);
        match self.matching(&utterance).and_then(|r| r.kind.clone()) {
            Some(kind) => kind,
            None if utterance.is_question() => InteractionKind::Question,
            None => InteractionKind::Declaration,
        }
    }

    /// Reply to `text` from the first matching rule.
    pub fn reply(&self, text: &str, profile: Option<&UserProfile>) -> String {
        let utterance = Utterance::new(text);
        match self.matching(&utterance) {
            Some(rule) => (rule.respond)(&utterance, profile),
            None => "Interesante lo que dices. ¿Te gustaría contarme más al respecto?".to_string(),
        }
    }
}

/// Opening line for taking the initiative, steered by the user's strongest
/// interest when there is one.
pub fn proactive_prompt(profile: Option<&UserProfile>) -> &'static str {
    match profile.and_then(|p| p.top_topic()).map(|(t, _)| t) {
        Some("tecnologia") => "¿Te gustaría que hablemos sobre las últimas novedades en tecnología?",
        Some("ciencia") => "¿Qué te parece si exploramos algún tema científico interesante?",
        Some("arte") => "¿Te interesa conversar sobre arte o expresión creativa?",
        Some("deportes") => "¿Qué te parece si hablamos de deportes?",
        Some("negocios") => "¿Te gustaría conversar sobre algún proyecto o negocio?",
        _ => "¿Te gustaría que te cuente sobre algún tema interesante?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aria_adaptation::{InteractionStats, StyleScores};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn profile(count: u64, topics: &[(&str, f64)]) -> UserProfile {
        UserProfile {
            user_id: "u1".into(),
            topic_weights: topics.iter().map(|(t, w)| (t.to_string(), *w)).collect::<BTreeMap<_, _>>(),
            style: StyleScores::default(),
            stats: InteractionStats {
                interaction_count: count,
                ..Default::default()
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn classifies_by_first_matching_rule() {
        let table = IntentTable::default();
        assert_eq!(table.classify("¡Hola Aria!"), InteractionKind::Greeting);
        assert_eq!(table.classify("Buenos días"), InteractionKind::Greeting);
        assert_eq!(table.classify("hola, ¿cómo estás?"), InteractionKind::Question);
        assert_eq!(table.classify("bueno, adiós"), InteractionKind::Farewell);
        assert_eq!(table.classify("¿qué hora es?"), InteractionKind::Question);
        assert_eq!(table.classify("me interesa la tecnología"), InteractionKind::Declaration);
    }

    #[test]
    fn greeting_depends_on_history() {
        let table = IntentTable::default();
        assert_eq!(table.reply("hola", None), "¡Hola! Me alegra conocerte. ¿Cómo estás?");
        assert_eq!(
            table.reply("hola", Some(&profile(5, &[]))),
            "¡Hola! Me alegra mucho volver a hablar contigo."
        );
    }

    #[test]
    fn follow_up_uses_top_topic() {
        let table = IntentTable::default();
        let reply = table.reply(
            "ayer estuve leyendo",
            Some(&profile(3, &[("ciencia", 2.0), ("arte", 1.0)])),
        );
        assert!(reply.contains("ciencia"), "{reply}");
        assert_eq!(
            table.reply("ayer estuve leyendo", None),
            "Interesante lo que dices. ¿Te gustaría contarme más al respecto?"
        );
    }

    #[test]
    fn replies_are_deterministic() {
        let table = IntentTable::default();
        let p = profile(2, &[("deportes", 1.0)]);
        assert_eq!(table.reply("vi el partido", Some(&p)), table.reply("vi el partido", Some(&p)));
    }

    #[test]
    fn proactive_prompt_follows_interest() {
        assert!(proactive_prompt(Some(&profile(1, &[("tecnologia", 3.0)]))).contains("tecnología"));
        assert!(proactive_prompt(None).contains("tema interesante"));
    }
}
