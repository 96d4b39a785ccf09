//! CJK-aware pre-segmentation.
//!
//! Tantivy's simple tokenizer splits on whitespace and punctuation, which
//! turns an unsegmented CJK sentence into one giant token. We expand CJK
//! runs into overlapping bigrams before indexing, and apply the same
//! transform to queries so tokens match.

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{AC00}'..='\u{D7AF}')
}

/// Rewrite `text` so every maximal CJK run becomes a space-separated list
/// of overlapping bigrams (a lone CJK character stays as-is). Non-CJK
/// spans pass through untouched. Idempotent on pure ASCII text.
pub fn segment_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run: Vec<char> = Vec::new();
    for c in text.chars() {
        if is_cjk(c) {
            run.push(c);
        } else {
            flush_run(&mut out, &mut run);
            out.push(c);
        }
    }
    flush_run(&mut out, &mut run);
    out
}

fn flush_run(out: &mut String, run: &mut Vec<char>) {
    if run.is_empty() {
        return;
    }
    if !out.is_empty() && !out.ends_with(char::is_whitespace) {
        out.push(' ');
    }
    if run.len() == 1 {
        out.push(run[0]);
    } else {
        for (i, pair) in run.windows(2).enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push(pair[0]);
            out.push(pair[1]);
        }
    }
    out.push(' ');
    run.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_text_is_unchanged() {
        assert_eq!(segment_text("tomato soup recipe"), "tomato soup recipe");
    }

    #[test]
    fn cjk_run_becomes_bigrams() {
        assert_eq!(segment_text("番茄汤").trim(), "番茄 茄汤");
    }

    #[test]
    fn mixed_text_segments_only_cjk_spans() {
        let out = segment_text("cook 番茄汤 tonight");
        assert!(out.contains("cook"));
        assert!(out.contains("番茄 茄汤"));
        assert!(out.contains("tonight"));
    }

    #[test]
    fn single_cjk_char_is_kept() {
        assert_eq!(segment_text("汤").trim(), "汤");
    }
}
