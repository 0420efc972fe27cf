//! Character reference decoding.
//!
//! `&nbsp;` becomes a plain space. The text is split around it before the
//! other references are decoded, so the space never merges with the output of
//! another substitution.

const NBSP_REF: &str = "&nbsp;";
const MAX_PASSES: usize = 3;
const MAX_REF_LEN: usize = 32;

/// Decodes named, decimal and hex character references until the text stops
/// changing (at most three passes). Unknown names and invalid code points are
/// left as written.
pub fn decode(text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_PASSES {
        if !current.contains('&') {
            break;
        }
        let next = decode_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn decode_once(text: &str) -> String {
    text.split(NBSP_REF)
        .map(decode_references)
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_references(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match reference_at(tail) {
            Some((len, decoded)) => {
                out.push_str(&decoded);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parses a reference at the start of `s` (which begins with `&`). Returns the
/// consumed byte length and its replacement.
fn reference_at(s: &str) -> Option<(usize, String)> {
    let semi = s[1..].char_indices().take(MAX_REF_LEN).find(|(_, c)| *c == ';')?.0 + 1;
    let body = &s[1..semi];
    let decoded = if let Some(num) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        code_point(u32::from_str_radix(num, 16).ok()?)?.to_string()
    } else if let Some(num) = body.strip_prefix('#') {
        if num.is_empty() || !num.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        code_point(num.parse::<u32>().ok()?)?.to_string()
    } else {
        named(body)?.to_string()
    };
    Some((semi + 1, decoded))
}

fn code_point(v: u32) -> Option<char> {
    if v == 0 {
        return None;
    }
    char::from_u32(v)
}

/// Well-formed `&name;` / `&#N;` references that [`decode`] cannot resolve.
pub fn unresolved_references(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        let tail = &rest[amp..];
        rest = &tail[1..];
        let Some(semi) = tail[1..]
            .char_indices()
            .take(MAX_REF_LEN)
            .find(|(_, c)| *c == ';')
            .map(|(i, _)| i + 1)
        else {
            continue;
        };
        let body = &tail[1..semi];
        let looks_like_ref = !body.is_empty()
            && (body.starts_with('#') || body.chars().all(|c| c.is_ascii_alphanumeric()));
        if looks_like_ref && body != "nbsp" && reference_at(tail).is_none() {
            out.push(tail[..=semi].to_string());
        }
    }
    out
}

fn named(name: &str) -> Option<&'static str> {
    let s = match name {
        // XML / HTML core
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        // spaces and invisible marks
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "zwnj" => "\u{200C}",
        "zwj" => "\u{200D}",
        "shy" => "\u{00AD}",
        // typographic
        "hellip" => "…",
        "mdash" => "—",
        "ndash" => "–",
        "lsquo" => "‘",
        "rsquo" => "’",
        "sbquo" => "‚",
        "ldquo" => "“",
        "rdquo" => "”",
        "bdquo" => "„",
        "laquo" => "«",
        "raquo" => "»",
        "lsaquo" => "‹",
        "rsaquo" => "›",
        "bull" => "•",
        "middot" => "·",
        "prime" => "′",
        "Prime" => "″",
        "dagger" => "†",
        "Dagger" => "‡",
        "para" => "¶",
        "sect" => "§",
        "copy" => "©",
        "reg" => "®",
        "trade" => "™",
        "iexcl" => "¡",
        "iquest" => "¿",
        "deg" => "°",
        "permil" => "‰",
        "ordf" => "ª",
        "ordm" => "º",
        "acute" => "´",
        "uml" => "¨",
        "macr" => "¯",
        "cedil" => "¸",
        // currency
        "cent" => "¢",
        "pound" => "£",
        "euro" => "€",
        "yen" => "¥",
        "curren" => "¤",
        // math
        "plusmn" => "±",
        "times" => "×",
        "divide" => "÷",
        "minus" => "−",
        "frac12" => "½",
        "frac14" => "¼",
        "frac34" => "¾",
        "sup1" => "¹",
        "sup2" => "²",
        "sup3" => "³",
        "micro" => "µ",
        "not" => "¬",
        "le" => "≤",
        "ge" => "≥",
        "ne" => "≠",
        "asymp" => "≈",
        "equiv" => "≡",
        "infin" => "∞",
        "sum" => "∑",
        "prod" => "∏",
        "radic" => "√",
        "part" => "∂",
        "int" => "∫",
        "prop" => "∝",
        "empty" => "∅",
        "isin" => "∈",
        "notin" => "∉",
        "cap" => "∩",
        "cup" => "∪",
        "and" => "∧",
        "or" => "∨",
        "forall" => "∀",
        "exist" => "∃",
        "nabla" => "∇",
        "lowast" => "∗",
        "sdot" => "⋅",
        // arrows
        "larr" => "←",
        "rarr" => "→",
        "uarr" => "↑",
        "darr" => "↓",
        "harr" => "↔",
        "lArr" => "⇐",
        "rArr" => "⇒",
        "hArr" => "⇔",
        // greek
        "alpha" => "α",
        "beta" => "β",
        "gamma" => "γ",
        "delta" => "δ",
        "epsilon" => "ε",
        "theta" => "θ",
        "lambda" => "λ",
        "mu" => "μ",
        "pi" => "π",
        "sigma" => "σ",
        "tau" => "τ",
        "phi" => "φ",
        "omega" => "ω",
        "Delta" => "Δ",
        "Sigma" => "Σ",
        "Omega" => "Ω",
        // a few Latin-1 letters editors emit as names
        "eacute" => "é",
        "egrave" => "è",
        "agrave" => "à",
        "aacute" => "á",
        "ccedil" => "ç",
        "ntilde" => "ñ",
        "ouml" => "ö",
        "uuml" => "ü",
        "auml" => "ä",
        "szlig" => "ß",
        _ => return None,
    };
    Some(s)
}
