//! Display ordering of APIs.
//!
//! Namespaces first, then types, then members.  Namespaces under a preferred
//! root (`System`, `Microsoft`) lead in that order.  Overloads and generic
//! arities of one base name sort by ascending arity before the literal name.

use std::cmp::Ordering;

use super::entities::ApiModel;
use crate::config::PREFERRED_NAMESPACES;
use crate::models::ApiKind;

fn rank(kind: ApiKind) -> u8 {
    if kind == ApiKind::Namespace {
        0
    } else if kind.is_type() {
        1
    } else {
        2
    }
}

fn namespace_priority(name: &str) -> usize {
    let root = name.split('.').next().unwrap_or(name);
    PREFERRED_NAMESPACES
        .iter()
        .position(|preferred| *preferred == root)
        .unwrap_or(PREFERRED_NAMESPACES.len())
}

/// Base name, generic arity and parameter count of a member or type name
/// such as `Select<TSource, TResult>(IEnumerable<TSource>, Func<TSource, TResult>)`.
#[derive(Debug, PartialEq, Eq)]
struct NameParts<'n> {
    base: &'n str,
    generic_arity: usize,
    parameter_count: usize,
}

fn split_name(name: &str) -> NameParts<'_> {
    let base_end = name.find(['<', '(']).unwrap_or(name.len());
    let base = &name[..base_end];
    let rest = &name[base_end..];

    let (generics, parameters) = match rest.strip_prefix('<') {
        Some(after) => {
            let close = matching_close(after, '<', '>');
            (Some(&after[..close]), &after[(close + 1).min(after.len())..])
        }
        None => (None, rest),
    };
    let parameters = parameters.strip_prefix('(').map(|after| {
        let close = matching_close(after, '(', ')');
        &after[..close]
    });

    NameParts {
        base,
        generic_arity: generics.map_or(0, count_top_level),
        parameter_count: parameters.map_or(0, count_top_level),
    }
}

/// Byte index of the bracket closing an already-opened group.
fn matching_close(text: &str, open: char, close: char) -> usize {
    let mut depth = 0usize;
    for (index, ch) in text.char_indices() {
        if ch == open {
            depth += 1;
        } else if ch == close {
            if depth == 0 {
                return index;
            }
            depth -= 1;
        }
    }
    text.len()
}

/// Comma-separated entries at nesting depth zero.
fn count_top_level(list: &str) -> usize {
    if list.trim().is_empty() {
        return 0;
    }
    let mut depth = 0i32;
    let mut count = 1;
    for ch in list.chars() {
        match ch {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            ',' if depth == 0 => count += 1,
            _ => {}
        }
    }
    count
}

fn compare_ignore_case(left: &str, right: &str) -> Ordering {
    left.chars()
        .flat_map(char::to_lowercase)
        .cmp(right.chars().flat_map(char::to_lowercase))
}

/// Ordering of two APIs given their kinds and names.
pub fn compare_api_names(
    left_kind: ApiKind,
    left: &str,
    right_kind: ApiKind,
    right: &str,
) -> Ordering {
    rank(left_kind).cmp(&rank(right_kind)).then_with(|| {
        if left_kind == ApiKind::Namespace && right_kind == ApiKind::Namespace {
            return namespace_priority(left)
                .cmp(&namespace_priority(right))
                .then_with(|| compare_ignore_case(left, right))
                .then_with(|| left.cmp(right));
        }
        let l = split_name(left);
        let r = split_name(right);
        compare_ignore_case(l.base, r.base)
            .then_with(|| l.base.cmp(r.base))
            .then_with(|| l.generic_arity.cmp(&r.generic_arity))
            .then_with(|| l.parameter_count.cmp(&r.parameter_count))
            .then_with(|| left.cmp(right))
    })
}

impl<'a> ApiModel<'a> {
    pub fn display_cmp(&self, other: &ApiModel<'_>) -> Ordering {
        compare_api_names(self.kind(), self.name(), other.kind(), other.name())
    }

    /// Children in display order.
    pub fn sorted_children(&self) -> Vec<ApiModel<'a>> {
        let mut children: Vec<_> = self.children().collect();
        children.sort_by(|a, b| a.display_cmp(b));
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(items: &[(ApiKind, &'static str)]) -> Vec<&'static str> {
        let mut items = items.to_vec();
        items.sort_by(|a, b| compare_api_names(a.0, a.1, b.0, b.1));
        items.into_iter().map(|(_, name)| name).collect()
    }

    #[test]
    fn test_split_name() {
        assert_eq!(
            split_name("Select<TSource, TResult>(IEnumerable<TSource>, Func<TSource, TResult>)"),
            NameParts {
                base: "Select",
                generic_arity: 2,
                parameter_count: 2
            }
        );
        assert_eq!(split_name("M()").parameter_count, 0);
        assert_eq!(split_name("List<T>").generic_arity, 1);
        assert_eq!(split_name("Length").base, "Length");
    }

    #[test]
    fn test_types_before_members() {
        assert_eq!(
            sorted(&[
                (ApiKind::Method, "Add(T)"),
                (ApiKind::Class, "Zebra"),
                (ApiKind::Namespace, "N"),
            ]),
            vec!["N", "Zebra", "Add(T)"]
        );
    }

    #[test]
    fn test_preferred_namespaces() {
        assert_eq!(
            sorted(&[
                (ApiKind::Namespace, "Azure.Core"),
                (ApiKind::Namespace, "Microsoft.Win32"),
                (ApiKind::Namespace, "System.Linq"),
                (ApiKind::Namespace, "System"),
                (ApiKind::Namespace, "Accessibility"),
            ]),
            vec!["System", "System.Linq", "Microsoft.Win32", "Accessibility", "Azure.Core"]
        );
    }

    #[test]
    fn test_arity_before_name() {
        assert_eq!(
            sorted(&[
                (ApiKind::Method, "Max(Int32, Int32, Int32)"),
                (ApiKind::Method, "Max<T>(T)"),
                (ApiKind::Method, "Max(Int32, Int32)"),
                (ApiKind::Method, "Max()"),
                (ApiKind::Method, "Min()"),
            ]),
            vec![
                "Max()",
                "Max(Int32, Int32)",
                "Max(Int32, Int32, Int32)",
                "Max<T>(T)",
                "Min()"
            ]
        );
        assert_eq!(
            sorted(&[
                (ApiKind::Class, "Tuple<T1, T2>"),
                (ApiKind::Class, "Tuple"),
                (ApiKind::Class, "Tuple<T1>"),
            ]),
            vec!["Tuple", "Tuple<T1>", "Tuple<T1, T2>"]
        );
    }
}
