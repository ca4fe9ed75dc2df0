use crate::options::SlugOptions;

/// URL-safe slug.
///
/// ASCII letters, digits and the symbols `$*_+~()'!:@` survive, common Latin
/// accents fold to ASCII, `.` is removed, and runs of whitespace or `-`
/// collapse into `options.replacement`. Anything else is dropped.
pub fn slugify(input: &str, options: &SlugOptions) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for ch in input.chars() {
        if ch.is_whitespace() || ch == '-' {
            flush_word(&mut current, &mut words);
            continue;
        }
        if let Some(folded) = fold_char(ch) {
            current.push_str(folded);
        } else if ch.is_ascii_alphanumeric() || is_kept_symbol(ch) {
            current.push(ch);
        }
    }
    flush_word(&mut current, &mut words);

    let slug = words.join(&options.replacement);
    if options.lower {
        slug.to_lowercase()
    } else {
        slug
    }
}

/// Turns a relative content path into slug input: the last extension is
/// stripped and path separators become hyphens.
pub fn prepare_path_for_slug(path: &str) -> String {
    let stem = match path.rfind('.') {
        Some(pos) if pos + 1 < path.len() => &path[..pos],
        _ => path,
    };
    stem.replace(['/', '\\'], "-")
}

fn flush_word(current: &mut String, words: &mut Vec<String>) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}

fn is_kept_symbol(ch: char) -> bool {
    matches!(ch, '$' | '*' | '_' | '+' | '~' | '(' | ')' | '\'' | '!' | ':' | '@')
}

fn fold_char(ch: char) -> Option<&'static str> {
    let folded = match ch {
        'À' | 'Á' | 'Â' | 'Ã' | 'Å' => "A",
        'Ä' | 'Æ' => "AE",
        'Ç' => "C",
        'È' | 'É' | 'Ê' | 'Ë' => "E",
        'Ì' | 'Í' | 'Î' | 'Ï' => "I",
        'Ñ' => "N",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ø' => "O",
        'Ö' | 'Œ' => "OE",
        'Ù' | 'Ú' | 'Û' => "U",
        'Ü' => "UE",
        'Ý' => "Y",
        'à' | 'á' | 'â' | 'ã' | 'å' => "a",
        'ä' | 'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ø' => "o",
        'ö' | 'œ' => "oe",
        'ù' | 'ú' | 'û' => "u",
        'ü' => "ue",
        'ý' | 'ÿ' => "y",
        'ß' => "ss",
        '&' => "and",
        _ => return None,
    };
    Some(folded)
}
