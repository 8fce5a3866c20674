use crate::error::NameError;
use crate::name::WEAK_TOKEN;

/// Name of the root document; names prefixed with it address part-set results.
pub const ROOT_DOCUMENT: &str = "PartSet";

const ALL_IN: &str = "all-in-";

/// A parsed selection name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Explicit document prefix (`PartSet/XOY`).
    pub document: Option<String>,
    pub expr: NameExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameExpr {
    /// Every result of a feature: `all-in-Box_1`.
    AllIn { feature: String },
    /// A whole result or feature: `Box_1_1`, `Sketch_1`.
    Context { context: String },
    /// A sub-shape named inside a result: `Box_1_1/Top`.
    Local { context: String, local: LocalName },
    /// Sub-shape shared by every listed shape: `[A][B][new_weak_name_2]`.
    Adjacency { items: Vec<String>, weak: Option<usize> },
}

/// The part of a name after the result context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalName {
    /// `Top`, `Modified_Face`, `Generated_Edge`.
    pub head: String,
    /// Full names of the ancestors a composite name was built from.
    pub sources: Vec<String>,
    pub weak: Option<usize>,
}

impl ParsedName {
    /// Result or feature identifiers this name refers to, with their document prefix.
    pub fn contexts(&self) -> Vec<(Option<String>, String)> {
        let mut out = Vec::new();
        let doc = self.document.clone();
        match &self.expr {
            NameExpr::AllIn { feature } => out.push((doc, feature.clone())),
            NameExpr::Context { context } => out.push((doc, context.clone())),
            NameExpr::Local { context, local } => {
                out.push((doc, context.clone()));
                for source in &local.sources {
                    if let Ok(parsed) = parse_name(source) {
                        out.extend(parsed.contexts());
                    }
                }
            }
            NameExpr::Adjacency { items, .. } => {
                for item in items {
                    if let Ok(parsed) = parse_name(item) {
                        out.extend(parsed.contexts());
                    }
                }
            }
        }
        out
    }
}

fn weak_index(token: &str) -> Option<usize> {
    token.strip_prefix(WEAK_TOKEN).and_then(|d| d.parse().ok())
}

/// Split `s` on `sep` where the bracket depth is zero.
fn split_top_level(s: &str, sep: char) -> Result<Vec<&str>, NameError> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth < 0 {
                    return Err(NameError::UnbalancedBrackets { name: s.into() });
                }
            }
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(NameError::UnbalancedBrackets { name: s.into() });
    }
    parts.push(&s[start..]);
    Ok(parts)
}

/// Index of the first top-level `/`.
fn first_slash(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            '/' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_brackets(s: &str) -> Result<NameExpr, NameError> {
    let mut items = Vec::new();
    let mut weak = None;
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' => {
                if depth == 0 {
                    start = i + 1;
                }
                depth += 1;
            }
            ']' => {
                depth -= 1;
                if depth < 0 {
                    return Err(NameError::UnbalancedBrackets { name: s.into() });
                }
                if depth == 0 {
                    let item = &s[start..i];
                    match weak_index(item) {
                        Some(index) => weak = Some(index),
                        None if item.is_empty() => {
                            return Err(NameError::Malformed {
                                name: s.into(),
                                reason: "empty bracket".into(),
                            })
                        }
                        None => items.push(item.to_string()),
                    }
                }
            }
            _ if depth == 0 => {
                return Err(NameError::Malformed {
                    name: s.into(),
                    reason: "text outside brackets".into(),
                })
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(NameError::UnbalancedBrackets { name: s.into() });
    }
    if items.is_empty() {
        return Err(NameError::Malformed {
            name: s.into(),
            reason: "no shapes listed".into(),
        });
    }
    Ok(NameExpr::Adjacency { items, weak })
}

fn parse_local(local: &str) -> Result<LocalName, NameError> {
    let parts = split_top_level(local, '&')?;
    let head = parts[0].to_string();
    let mut sources = Vec::new();
    let mut weak = None;
    for part in &parts[1..] {
        match weak_index(part) {
            Some(index) => weak = Some(index),
            None => sources.push(part.to_string()),
        }
    }
    Ok(LocalName { head, sources, weak })
}

/// Parse a selection name.
///
/// ```text
/// name  := [document "/"] body
/// body  := "all-in-" feature | "[" name "]"+ | context | context "/" local
/// local := head ("&" name)* ["&new_weak_name_" N]
/// ```
pub fn parse_name(name: &str) -> Result<ParsedName, NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    let (document, body) = match name.strip_prefix(ROOT_DOCUMENT) {
        Some(rest) if rest.starts_with('/') => (Some(ROOT_DOCUMENT.to_string()), &rest[1..]),
        _ => (None, name),
    };
    if body.is_empty() {
        return Err(NameError::Malformed {
            name: name.into(),
            reason: "nothing after the document prefix".into(),
        });
    }

    let expr = if let Some(feature) = body.strip_prefix(ALL_IN) {
        NameExpr::AllIn {
            feature: feature.to_string(),
        }
    } else if body.starts_with('[') {
        parse_brackets(body)?
    } else {
        match first_slash(body) {
            None => NameExpr::Context {
                context: body.to_string(),
            },
            Some(i) => {
                let local = &body[i + 1..];
                if local.is_empty() {
                    return Err(NameError::Malformed {
                        name: name.into(),
                        reason: "empty sub-shape name".into(),
                    });
                }
                NameExpr::Local {
                    context: body[..i].to_string(),
                    local: parse_local(local)?,
                }
            }
        }
    };
    Ok(ParsedName { document, expr })
}
