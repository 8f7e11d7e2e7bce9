//! Speech output and reply styling.
//!
//! Speaking is a capability the core can live without: a `Speaker` that
//! fails is logged and otherwise ignored.

use aria_adaptation::StyleScores;
use tracing::{info, warn};

pub trait Speaker: Send + Sync {
    fn name(&self) -> &str;

    fn speak(&self, text: &str) -> anyhow::Result<()>;
}

/// Discards everything. Used when no voice output is attached.
pub struct NullSpeaker;

impl Speaker for NullSpeaker {
    fn name(&self) -> &str {
        "null"
    }

    fn speak(&self, _text: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Writes each utterance to the log.
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn name(&self) -> &str {
        "log"
    }

    fn speak(&self, text: &str) -> anyhow::Result<()> {
        info!(target: "aria::speech", "{}", text);
        Ok(())
    }
}

/// Speak through `speaker`, logging instead of propagating a failure.
pub fn say(speaker: &dyn Speaker, text: &str) -> bool {
    match speaker.speak(text) {
        Ok(()) => true,
        Err(e) => {
            warn!("Speaker {} failed: {:#}", speaker.name(), e);
            false
        }
    }
}

const HIGH: f64 = 0.7;
const LOW: f64 = 0.3;

const FORMAL_SWAPS: &[(&str, &str)] = &[
    ("tú", "usted"),
    ("tu", "su"),
    ("te", "le"),
    ("contigo", "con usted"),
];
const INFORMAL_SWAPS: &[(&str, &str)] = &[("usted", "tú")];

/// Adjust reply text to a user's preferred style: pronoun register by
/// formality, length by verbosity, and exclamation by emotionality.
pub fn shape_reply(text: &str, style: &StyleScores) -> String {
    let mut out = if style.formality > HIGH {
        swap_words(text, FORMAL_SWAPS)
    } else if style.formality < LOW {
        swap_words(text, INFORMAL_SWAPS)
    } else {
        text.to_string()
    };

    if style.verbosity < LOW {
        out = first_sentence(&out).to_string();
    } else if style.verbosity > HIGH && !out.trim_end().ends_with('?') {
        let more = if style.formality > HIGH {
            "¿Le gustaría saber más al respecto?"
        } else {
            "¿Te gustaría saber más al respecto?"
        };
        out = format!("{} {}", out.trim_end(), more);
    }

    if style.emotionality > HIGH {
        out = exclaim(&out);
    } else if style.emotionality < LOW {
        out = calm(&out);
    }
    out
}

/// Replace whole words, keeping a leading capital.
fn swap_words(text: &str, swaps: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word = String::new();
    for c in text.chars() {
        if c.is_alphabetic() {
            word.push(c);
        } else {
            flush_word(&mut out, &mut word, swaps);
            out.push(c);
        }
    }
    flush_word(&mut out, &mut word, swaps);
    out
}

fn flush_word(out: &mut String, word: &mut String, swaps: &[(&str, &str)]) {
    if word.is_empty() {
        return;
    }
    let lower = word.to_lowercase();
    match swaps.iter().find(|(from, _)| *from == lower) {
        Some((_, to)) if word.starts_with(char::is_uppercase) => {
            let mut chars = to.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
        Some((_, to)) => out.push_str(to),
        None => out.push_str(word),
    }
    word.clear();
}

fn first_sentence(text: &str) -> &str {
    match text.find(['.', '!', '?']) {
        Some(end) => {
            let end = end + 1;
            let head = &text[..end];
            // "¡Hola!" alone says nothing; keep going to the next sentence.
            if head.trim().chars().filter(|c| c.is_alphabetic()).count() < 6 {
                match text[end..].find(['.', '!', '?']) {
                    Some(next) => &text[..end + next + 1],
                    None => text,
                }
            } else {
                head
            }
        }
        None => text,
    }
}

fn exclaim(text: &str) -> String {
    if text.contains('!') {
        return text.to_string();
    }
    let body = text.trim_end().trim_end_matches('.');
    if body.ends_with('?') {
        return text.to_string();
    }
    format!("¡{}!", body)
}

fn calm(text: &str) -> String {
    text.replace('¡', "").replace('!', ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(formality: f64, verbosity: f64, emotionality: f64) -> StyleScores {
        StyleScores {
            formality,
            verbosity,
            emotionality,
            proactivity: 0.5,
        }
    }

    #[test]
    fn neutral_style_leaves_text_alone() {
        let text = "¡Hola! Me alegra conocerte. ¿Cómo estás?";
        assert_eq!(shape_reply(text, &StyleScores::default()), text);
    }

    #[test]
    fn formal_style_swaps_pronouns() {
        let out = shape_reply("Ha sido un placer conversar contigo. ¿Y tú?", &style(0.9, 0.5, 0.5));
        assert_eq!(out, "Ha sido un placer conversar con usted. ¿Y usted?");
    }

    #[test]
    fn formal_swap_leaves_longer_words() {
        let out = shape_reply("Tengo tiempo para tu tema.", &style(0.9, 0.5, 0.5));
        assert_eq!(out, "Tengo tiempo para su tema.");
    }

    #[test]
    fn terse_style_keeps_first_sentence() {
        let out = shape_reply("¡Hola! Me alegra conocerte. ¿Cómo estás?", &style(0.5, 0.1, 0.5));
        assert_eq!(out, "¡Hola! Me alegra conocerte.");
    }

    #[test]
    fn verbose_style_invites_more() {
        let out = shape_reply("Eso es interesante.", &style(0.5, 0.9, 0.5));
        assert_eq!(out, "Eso es interesante. ¿Te gustaría saber más al respecto?");
    }

    #[test]
    fn emotional_style_exclaims_and_calm_style_does_not() {
        assert_eq!(shape_reply("Muy bien.", &style(0.5, 0.5, 0.9)), "¡Muy bien!");
        assert_eq!(shape_reply("¡Muy bien!", &style(0.5, 0.5, 0.1)), "Muy bien.");
    }

    #[test]
    fn failing_speaker_is_contained() {
        struct Broken;
        impl Speaker for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn speak(&self, _text: &str) -> anyhow::Result<()> {
                anyhow::bail!("no audio device")
            }
        }
        assert!(!say(&Broken, "hola"));
        assert!(say(&NullSpeaker, "hola"));
    }
}
