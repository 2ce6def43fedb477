/// Phrases that open a correction ("actually, make that Wednesday").
const CORRECTION_CUES: &[&str] = &[
    "actually",
    "i meant",
    "instead",
    "not that",
    "sorry",
    "wait,",
    "no wait",
    "change that",
    "make that",
    "scratch that",
];

/// Phrases that signal the patient has had enough of the assistant.
const FRUSTRATION_CUES: &[&str] = &[
    "frustrated",
    "frustrating",
    "ridiculous",
    "this is taking",
    "speak to a human",
    "talk to a human",
    "real person",
    "speak to someone",
    "talk to someone",
    "useless",
    "not listening",
    "you don't understand",
    "forget it",
    "i give up",
    "just book",
];

pub fn is_correction(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    CORRECTION_CUES.iter().any(|cue| lower.contains(cue))
}

pub fn is_frustrated(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    FRUSTRATION_CUES.iter().any(|cue| lower.contains(cue))
}
