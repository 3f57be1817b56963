//! Variable name suggestions.
//!
//! Candidate names for loop variables and accumulators are derived from
//! types (`List<User>` suggests `users`, then `list`) and from expressions
//! (`user.getName()` suggests `name`). Hosts may override both through the
//! lowering engine's host trait; these are the defaults.

use crate::ast::ExprKind;
use crate::{ExprArena, ExprId, JavaType, PrimitiveType};

/// Java keywords and literal words that cannot name a variable.
pub const RESERVED: &[&str] = &[
    "_", "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "false", "final", "finally",
    "float", "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "null", "package", "private", "protected", "public", "record", "return",
    "short", "static", "strictfp", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "true", "try", "var", "void", "volatile", "while", "yield",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// Whether `name` is a legal, non-reserved Java identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !is_reserved(name)
}

/// Names suggested by a type, best first.
pub fn suggest_for_type(ty: &JavaType) -> Vec<String> {
    let mut out = Vec::new();
    match ty {
        JavaType::Primitive(p) => out.push(primitive_name(*p).to_owned()),
        JavaType::Array(component) => {
            if let Some(stem) = element_stem(component) {
                push_unique(&mut out, pluralize(&stem));
            }
            push_unique(&mut out, "arr".to_owned());
        }
        JavaType::Class { args, .. } => {
            let simple = ty.simple_name().unwrap_or_default();
            match simple {
                "String" => out.extend(["s".to_owned(), "string".to_owned()]),
                "Object" => out.extend(["o".to_owned(), "object".to_owned()]),
                _ => {
                    if let [element] = args.as_slice() {
                        if ty.is_collection_like() || matches!(simple, "Iterable" | "Stream") {
                            if let Some(stem) = element_stem(&element.eliminate_wildcards()) {
                                push_unique(&mut out, pluralize(&stem));
                            }
                        }
                    }
                    for candidate in camel_suffixes(simple) {
                        push_unique(&mut out, avoid_reserved(candidate));
                    }
                    if let Some(p) = PrimitiveType::from_boxed(simple) {
                        push_unique(&mut out, primitive_name(p).to_owned());
                    }
                }
            }
        }
        JavaType::Void | JavaType::Wildcard(_) | JavaType::Null => {}
    }
    out.retain(|name| is_identifier(name));
    out
}

/// Names suggested by an expression's shape, best first.
pub fn suggest_for_expr(arena: &ExprArena, id: ExprId) -> Vec<String> {
    let mut out = Vec::new();
    match arena.kind(id) {
        ExprKind::Name(name) => out.push(name.clone()),
        ExprKind::Field { name, .. } => {
            // constants such as MAX_VALUE say nothing about the value
            if name.chars().any(char::is_lowercase) {
                out.push(name.clone());
            }
        }
        ExprKind::Call { method, args, .. } if args.is_empty() => {
            out.extend(accessor_name(method));
            out.push(method.clone());
        }
        ExprKind::MethodRef { method, .. } => out.extend(accessor_name(method)),
        ExprKind::Cast { operand, .. } => out = suggest_for_expr(arena, *operand),
        ExprKind::New { class, .. } => out = suggest_for_type(class),
        _ => {}
    }
    out.retain(|name| is_identifier(name));
    out
}

/// Property name behind an accessor: `getName` gives `name`, `isEmpty` gives `empty`.
pub fn accessor_name(method: &str) -> Option<String> {
    ["get", "is", "to", "as"].iter().find_map(|prefix| {
        let rest = method.strip_prefix(prefix)?;
        rest.chars()
            .next()
            .filter(char::is_ascii_uppercase)
            .map(|_| decapitalize(rest))
    })
}

/// Singular form of a plural name, if it looks plural.
///
/// `users` gives `user`, `entries` gives `entry`, `userList` gives `user`.
pub fn unpluralize(name: &str) -> Option<String> {
    for suffix in ["List", "Set", "Array", "Collection"] {
        if let Some(stem) = name.strip_suffix(suffix) {
            if !stem.is_empty() {
                return Some(stem.to_owned());
            }
        }
    }
    match name {
        "children" => return Some("child".to_owned()),
        "people" => return Some("person".to_owned()),
        _ => {}
    }
    if let Some(stem) = name.strip_suffix("ies") {
        return (!stem.is_empty()).then(|| format!("{stem}y"));
    }
    for suffix in ["sses", "xes", "ches", "shes"] {
        if name.ends_with(suffix) {
            return Some(name[..name.len() - 2].to_owned());
        }
    }
    if name.ends_with("ss") || name.ends_with("us") {
        return None;
    }
    name.strip_suffix('s')
        .filter(|stem| stem.len() > 1)
        .map(str::to_owned)
}

/// Plural form of a singular name.
pub fn pluralize(name: &str) -> String {
    let consonant_y = name.strip_suffix('y').filter(|stem| {
        stem.chars()
            .last()
            .is_some_and(|c| !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'))
    });
    if let Some(stem) = consonant_y {
        return format!("{stem}ies");
    }
    if ["s", "x", "ch", "sh"].iter().any(|suffix| name.ends_with(suffix)) {
        return format!("{name}es");
    }
    format!("{name}s")
}

/// `Foo` becomes `foo`, `URL` becomes `url`, `URLConnection` stays `urlConnection`.
pub fn decapitalize(name: &str) -> String {
    let upper = name.chars().take_while(char::is_ascii_uppercase).count();
    let total = name.chars().count();
    let lower = match upper {
        0 => 0,
        n if n == total => n,
        1 => 1,
        // keep the last capital: it starts the next word
        n => n - 1,
    };
    name.chars()
        .enumerate()
        .map(|(i, c)| if i < lower { c.to_ascii_lowercase() } else { c })
        .collect()
}

/// Word used to pluralize an element type: `int` for `int`, `user` for `User`.
fn element_stem(element: &JavaType) -> Option<String> {
    if let Some(p) = element.as_primitive() {
        return Some(p.keyword().to_owned());
    }
    let suggestions = suggest_for_type(element);
    suggestions
        .iter()
        .find(|name| name.len() > 1)
        .or_else(|| suggestions.first())
        .cloned()
}

fn primitive_name(p: PrimitiveType) -> &'static str {
    match p {
        PrimitiveType::Int => "i",
        PrimitiveType::Long => "l",
        PrimitiveType::Float | PrimitiveType::Double => "v",
        PrimitiveType::Boolean | PrimitiveType::Byte => "b",
        PrimitiveType::Char => "c",
        PrimitiveType::Short => "s",
    }
}

/// `StringBuilder` gives `stringBuilder`, then `builder`.
fn camel_suffixes(simple: &str) -> Vec<String> {
    let starts: Vec<usize> = simple
        .char_indices()
        .filter(|&(i, c)| {
            i == 0
                || (c.is_ascii_uppercase()
                    && simple[i..].chars().nth(1).map_or(true, |next| next.is_ascii_lowercase()))
        })
        .map(|(i, _)| i)
        .collect();
    starts.iter().map(|&i| decapitalize(&simple[i..])).collect()
}

fn avoid_reserved(name: String) -> String {
    if is_reserved(&name) {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => format!("a{}{}", first.to_ascii_uppercase(), chars.as_str()),
            None => name,
        }
    } else {
        name
    }
}

fn push_unique(out: &mut Vec<String>, name: String) {
    if !out.contains(&name) {
        out.push(name);
    }
}
