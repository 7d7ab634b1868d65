/// Line height used for every engine-authored text element.
pub fn line_height(font_size: f64) -> f64 {
    font_size * 1.25
}

// ASCII glyphs average a bit over half an em; CJK and other wide glyphs take a full em.
fn glyph_width(c: char, font_size: f64) -> f64 {
    if c.is_ascii() {
        font_size * 0.6
    } else {
        font_size
    }
}

/// Greedy word wrap against `max_width`. Words wider than a line are broken
/// between characters. Explicit newlines are kept.
pub fn wrap_text(text: &str, max_width: f64, font_size: f64) -> Vec<String> {
    let mut out = Vec::new();
    for para in text.split('\n') {
        wrap_paragraph(para.trim_end(), max_width, font_size, &mut out);
    }
    out
}

fn wrap_paragraph(para: &str, max_width: f64, font_size: f64, out: &mut Vec<String>) {
    let mut line = String::new();
    let mut width = 0.0;
    let space = glyph_width(' ', font_size);

    for word in para.split(' ').filter(|w| !w.is_empty()) {
        let word_width: f64 = word.chars().map(|c| glyph_width(c, font_size)).sum();
        let lead = if line.is_empty() { 0.0 } else { space };

        if width + lead + word_width <= max_width {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
            width += lead + word_width;
            continue;
        }

        if !line.is_empty() {
            out.push(std::mem::take(&mut line));
            width = 0.0;
        }
        for c in word.chars() {
            let w = glyph_width(c, font_size);
            if width + w > max_width && !line.is_empty() {
                out.push(std::mem::take(&mut line));
                width = 0.0;
            }
            line.push(c);
            width += w;
        }
    }
    out.push(line);
}
