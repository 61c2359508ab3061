//! CSS selector parsing.
//!
//! Supports selector lists, type/universal/id/class selectors, attribute
//! selectors with the standard operators, `:not()`, `:first-child`,
//! `:last-child` and the four combinators.

use pj_core::PjaxError;
use pj_core::PjaxResult;

/// Comma-separated list of complex selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    pub(crate) selectors: Vec<ComplexSelector>,
}

/// Compounds joined by combinators, stored left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ComplexSelector {
    pub(crate) compounds: Vec<CompoundSelector>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    pub(crate) combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
    NextSibling,
    SubsequentSibling,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CompoundSelector {
    pub(crate) tag: Option<String>,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attributes: Vec<AttributeSelector>,
    pub(crate) pseudos: Vec<PseudoClass>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttributeSelector {
    pub(crate) name: String,
    pub(crate) test: Option<(AttributeOperator, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttributeOperator {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PseudoClass {
    Not(SelectorList),
    FirstChild,
    LastChild,
}

impl AttributeSelector {
    pub(crate) fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        let Some((operator, expected)) = &self.test else {
            return true;
        };
        let expected = expected.as_str();

        match operator {
            AttributeOperator::Equals => value == expected,
            AttributeOperator::Includes => {
                !expected.is_empty() && value.split_ascii_whitespace().any(|part| part == expected)
            }
            AttributeOperator::DashMatch => {
                value == expected
                    || value
                        .strip_prefix(expected)
                        .is_some_and(|rest| rest.starts_with('-'))
            }
            AttributeOperator::Prefix => !expected.is_empty() && value.starts_with(expected),
            AttributeOperator::Suffix => !expected.is_empty() && value.ends_with(expected),
            AttributeOperator::Substring => !expected.is_empty() && value.contains(expected),
        }
    }
}

impl SelectorList {
    pub fn parse(input: &str) -> PjaxResult<Self> {
        let parts = split_top_level(input, b',');
        let mut selectors = Vec::with_capacity(parts.len());
        for part in parts {
            selectors.push(parse_complex(part).ok_or_else(|| invalid(input))?);
        }

        if selectors.is_empty() {
            return Err(invalid(input));
        }

        Ok(Self { selectors })
    }
}

/// Splits `input` on `delimiter` outside quotes, brackets and parentheses.
pub fn split_top_level(input: &str, delimiter: u8) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0_usize;
    let mut quote: Option<u8> = None;
    let mut escape = false;
    let mut bracket_depth = 0_u32;
    let mut paren_depth = 0_u32;

    for (idx, byte) in bytes.iter().copied().enumerate() {
        if let Some(open) = quote {
            if escape {
                escape = false;
            } else if byte == b'\\' {
                escape = true;
            } else if byte == open {
                quote = None;
            }
            continue;
        }

        match byte {
            b'\'' | b'"' => quote = Some(byte),
            b'[' => bracket_depth = bracket_depth.saturating_add(1),
            b']' => bracket_depth = bracket_depth.saturating_sub(1),
            b'(' => paren_depth = paren_depth.saturating_add(1),
            b')' => paren_depth = paren_depth.saturating_sub(1),
            _ if byte == delimiter && bracket_depth == 0 && paren_depth == 0 => {
                parts.push(&input[start..idx]);
                start = idx.saturating_add(1);
            }
            _ => {}
        }
    }

    parts.push(&input[start..]);
    parts
}

fn invalid(input: &str) -> PjaxError {
    PjaxError::new(
        "dom.selector.invalid",
        format!("`{input}` is not a valid selector"),
    )
}

fn parse_complex(input: &str) -> Option<ComplexSelector> {
    let bytes = input.trim().as_bytes();
    if bytes.is_empty() {
        return None;
    }

    let mut idx = 0_usize;
    let mut quote: Option<u8> = None;
    let mut escape = false;
    let mut bracket_depth = 0_u32;
    let mut paren_depth = 0_u32;
    let mut pending_descendant = false;
    let mut compound = Vec::new();
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();

    while idx < bytes.len() {
        let byte = bytes[idx];
        idx = idx.saturating_add(1);

        if let Some(open) = quote {
            compound.push(byte);
            if escape {
                escape = false;
            } else if byte == b'\\' {
                escape = true;
            } else if byte == open {
                quote = None;
            }
            continue;
        }

        if bracket_depth > 0 || paren_depth > 0 {
            compound.push(byte);
            match byte {
                b'\'' | b'"' => quote = Some(byte),
                b'[' => bracket_depth = bracket_depth.saturating_add(1),
                b']' => bracket_depth = bracket_depth.saturating_sub(1),
                b'(' => paren_depth = paren_depth.saturating_add(1),
                b')' => paren_depth = paren_depth.saturating_sub(1),
                _ => {}
            }
            continue;
        }

        match byte {
            b'>' | b'+' | b'~' => {
                if !compound.is_empty() {
                    compounds.push(std::mem::take(&mut compound));
                } else if compounds.len() == combinators.len() {
                    return None;
                }
                pending_descendant = false;
                combinators.push(match byte {
                    b'>' => Combinator::Child,
                    b'+' => Combinator::NextSibling,
                    _ => Combinator::SubsequentSibling,
                });
            }
            _ if byte.is_ascii_whitespace() => {
                if !compound.is_empty() {
                    compounds.push(std::mem::take(&mut compound));
                    pending_descendant = true;
                }
            }
            _ => {
                if pending_descendant {
                    combinators.push(Combinator::Descendant);
                    pending_descendant = false;
                }
                match byte {
                    b'\'' | b'"' => quote = Some(byte),
                    b'[' => bracket_depth = bracket_depth.saturating_add(1),
                    b'(' => paren_depth = paren_depth.saturating_add(1),
                    _ => {}
                }
                compound.push(byte);
            }
        }
    }

    if quote.is_some() || bracket_depth > 0 || paren_depth > 0 {
        return None;
    }
    if !compound.is_empty() {
        compounds.push(compound);
    }
    if compounds.is_empty() || combinators.len().saturating_add(1) != compounds.len() {
        return None;
    }

    let mut parsed = Vec::with_capacity(compounds.len());
    for raw in compounds {
        let raw = String::from_utf8(raw).ok()?;
        parsed.push(parse_compound(&raw)?);
    }

    Some(ComplexSelector {
        compounds: parsed,
        combinators,
    })
}

fn parse_compound(input: &str) -> Option<CompoundSelector> {
    let bytes = input.as_bytes();
    let mut selector = CompoundSelector::default();
    let mut idx = 0_usize;

    if bytes.first() == Some(&b'*') {
        idx = 1;
    } else if bytes
        .first()
        .is_some_and(|byte| byte.is_ascii_alphabetic() || *byte == b'_')
    {
        let end = scan_ident(bytes, idx);
        selector.tag = Some(input[idx..end].to_ascii_lowercase());
        idx = end;
    }

    while idx < bytes.len() {
        match bytes[idx] {
            b'#' | b'.' => {
                let start = idx.saturating_add(1);
                let end = scan_ident(bytes, start);
                if start == end {
                    return None;
                }
                let value = input[start..end].to_owned();
                if bytes[idx] == b'#' {
                    if selector.id.is_some() {
                        return None;
                    }
                    selector.id = Some(value);
                } else {
                    selector.classes.push(value);
                }
                idx = end;
            }
            b'[' => {
                let close = find_closing(bytes, idx, b'[', b']')?;
                selector
                    .attributes
                    .push(parse_attribute(&input[idx.saturating_add(1)..close])?);
                idx = close.saturating_add(1);
            }
            b':' => {
                let start = idx.saturating_add(1);
                let end = scan_ident(bytes, start);
                let name = input[start..end].to_ascii_lowercase();
                idx = end;
                match name.as_str() {
                    "first-child" => selector.pseudos.push(PseudoClass::FirstChild),
                    "last-child" => selector.pseudos.push(PseudoClass::LastChild),
                    "not" if bytes.get(idx) == Some(&b'(') => {
                        let close = find_closing(bytes, idx, b'(', b')')?;
                        let inner = SelectorList::parse(&input[idx.saturating_add(1)..close]).ok()?;
                        selector.pseudos.push(PseudoClass::Not(inner));
                        idx = close.saturating_add(1);
                    }
                    _ => return None,
                }
            }
            _ => return None,
        }
    }

    Some(selector)
}

fn parse_attribute(input: &str) -> Option<AttributeSelector> {
    let trimmed = input.trim();
    let bytes = trimmed.as_bytes();
    let end = scan_ident(bytes, 0);
    if end == 0 {
        return None;
    }

    let name = trimmed[..end].to_ascii_lowercase();
    let rest = trimmed[end..].trim_start();
    if rest.is_empty() {
        return Some(AttributeSelector { name, test: None });
    }

    let (operator, value) = if let Some(value) = rest.strip_prefix('=') {
        (AttributeOperator::Equals, value)
    } else {
        let operator = match rest.as_bytes().first()? {
            b'~' => AttributeOperator::Includes,
            b'|' => AttributeOperator::DashMatch,
            b'^' => AttributeOperator::Prefix,
            b'$' => AttributeOperator::Suffix,
            b'*' => AttributeOperator::Substring,
            _ => return None,
        };
        (operator, rest.get(1..)?.strip_prefix('=')?)
    };

    Some(AttributeSelector {
        name,
        test: Some((operator, parse_attribute_value(value.trim())?)),
    })
}

fn parse_attribute_value(input: &str) -> Option<String> {
    let open = input.chars().next()?;

    if open != '"' && open != '\'' {
        let valid = input
            .bytes()
            .all(|byte| is_ident_char(byte) || byte >= 0x80);
        return valid.then(|| input.to_owned());
    }

    let mut out = String::new();
    let mut chars = input[1..].chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push(chars.next()?),
            _ if ch == open => {
                return chars.as_str().trim().is_empty().then_some(out);
            }
            _ => out.push(ch),
        }
    }

    None
}

fn find_closing(bytes: &[u8], open_idx: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0_u32;
    let mut quote: Option<u8> = None;
    let mut escape = false;

    for (idx, byte) in bytes.iter().copied().enumerate().skip(open_idx) {
        if let Some(q) = quote {
            if escape {
                escape = false;
            } else if byte == b'\\' {
                escape = true;
            } else if byte == q {
                quote = None;
            }
            continue;
        }

        if byte == b'\'' || byte == b'"' {
            quote = Some(byte);
        } else if byte == open {
            depth = depth.saturating_add(1);
        } else if byte == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(idx);
            }
        }
    }

    None
}

fn scan_ident(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && (is_ident_char(bytes[idx]) || bytes[idx] >= 0x80) {
        idx = idx.saturating_add(1);
    }
    idx
}

fn is_ident_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_'
}

#[cfg(test)]
mod tests {
    use super::AttributeOperator;
    use super::Combinator;
    use super::PseudoClass;
    use super::SelectorList;
    use super::split_top_level;

    fn parse(input: &str) -> SelectorList {
        let parsed = SelectorList::parse(input);
        assert!(parsed.is_ok(), "{input}");
        match parsed {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn parses_lists_and_combinators() {
        let list = parse("head > link, body a ~ p + span");
        assert_eq!(list.selectors.len(), 2);
        assert_eq!(list.selectors[0].combinators, vec![Combinator::Child]);
        assert_eq!(
            list.selectors[1].combinators,
            vec![
                Combinator::Descendant,
                Combinator::SubsequentSibling,
                Combinator::NextSibling
            ]
        );
    }

    #[test]
    fn parses_attribute_operators() {
        let list = parse(r#"link[rel~="stylesheet"][href^='chrome-extension://'][data-x]"#);
        let compound = &list.selectors[0].compounds[0];
        assert_eq!(compound.tag.as_deref(), Some("link"));
        assert_eq!(compound.attributes.len(), 3);
        assert_eq!(
            compound.attributes[0].test,
            Some((AttributeOperator::Includes, "stylesheet".to_owned()))
        );
        assert_eq!(
            compound.attributes[1].test,
            Some((AttributeOperator::Prefix, "chrome-extension://".to_owned()))
        );
        assert_eq!(compound.attributes[2].test, None);
    }

    #[test]
    fn parses_not_with_nested_list() {
        let list = parse("[href]:not([target], .external)");
        let compound = &list.selectors[0].compounds[0];
        assert!(compound.tag.is_none());
        assert!(matches!(&compound.pseudos[0], PseudoClass::Not(inner) if inner.selectors.len() == 2));
    }

    #[test]
    fn commas_inside_brackets_do_not_split() {
        assert_eq!(
            split_top_level(r#"a[title="x, y"], :not(b, c), d"#, b','),
            vec![r#"a[title="x, y"]"#, " :not(b, c)", " d"]
        );
    }

    #[test]
    fn underscore_is_a_tag_name() {
        let list = parse("_");
        assert_eq!(list.selectors[0].compounds[0].tag.as_deref(), Some("_"));
    }

    #[test]
    fn rejects_malformed_selectors() {
        for input in ["", " ", "a,", "> a", "a >", "[href", "a:hover", "#", "a[x=\"y]"] {
            assert!(SelectorList::parse(input).is_err(), "{input}");
        }
    }
}
