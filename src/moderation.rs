//! Word-list content filter. The engine itself is agnostic to these lists;
//! only the send handler runs content through here, before it ever reaches
//! the message stream.

const VIOLENT_WORDS: &[&str] = &["racist", "nazis", "hitler", "kill", "murder"];
const MILD_WORDS: &[&str] = &["fuck", "shit", "damn", "ass"];

/// `moderate` censors the violent list; `advanced` additionally censors the
/// mild list. With both flags off the text passes through untouched.
pub fn filter(content: &str, moderate: bool, advanced: bool) -> String {
    if !moderate && !advanced {
        return content.to_owned();
    }

    let mut filtered = content.to_owned();
    if moderate {
        for word in VIOLENT_WORDS {
            filtered = censor(&filtered, word);
        }
    }
    if advanced {
        for word in MILD_WORDS {
            filtered = censor(&filtered, word);
        }
    }
    filtered
}

// Case-insensitive substring replacement; ascii lowercasing keeps byte
// offsets valid for slicing the original text.
fn censor(text: &str, word: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let word = word.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut from = 0;
    while let Some(pos) = lower[from..].find(&word) {
        let at = from + pos;
        out.push_str(&text[from..at]);
        out.push_str("***");
        from = at + word.len();
    }
    out.push_str(&text[from..]);
    out
}
