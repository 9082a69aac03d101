//! Name and file-name derivation for resources.

use std::path::Path;

/// Word appended to the names of duplicated resources.
pub const COPY_WORD: &str = "copy";

// Folder names that only say which kind of data lives inside; they are not
// useful as tags.
const KIND_FOLDER_NAMES: &[&str] = &[
    "brushes",
    "dynamics",
    "patterns",
    "palettes",
    "gradients",
    "tool-presets",
];

const UNSAFE_FILENAME_CHARS: &[char] = &[
    '\\', '/', '*', '?', '"', '`', '\'', '<', '>', '{', '}', '|', '\n', '\t', ' ', ';', ':', '$',
    '^', '&',
];

/// Name proposed for a duplicate of `name`, using the default copy word.
pub fn duplicate_name(name: &str) -> String {
    duplicate_name_with(name, COPY_WORD)
}

/// Name proposed for a duplicate of `name`.
///
/// Names that already end in `copy_word`, or in a `#<n>` counter, are reused
/// as-is so repeated duplication does not grow "copy copy copy" chains; the
/// container's unique naming takes care of the clash.
pub fn duplicate_name_with(name: &str, copy_word: &str) -> String {
    if name.ends_with(copy_word) || has_counter_suffix(name) {
        name.to_string()
    } else {
        format!("{name} {copy_word}")
    }
}

// A `#` followed by a positive decimal number written without padding.
fn has_counter_suffix(name: &str) -> bool {
    let Some(pos) = name.rfind('#') else {
        return false;
    };
    let digits = &name[pos + 1..];
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && !digits.starts_with('0')
}

/// Make `name` unique with respect to `is_taken`.
///
/// A clashing name becomes `"<base> #<n>"` with the smallest free `n`. An
/// existing `#<n>` counter (with or without one space before it) is treated as
/// part of the numbering, so `"Foo #2"` continues at `"Foo #3"`.
pub fn unique_name(name: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(name) {
        return name.to_string();
    }

    let (mut base, mut counter) = split_counter(name);
    loop {
        counter = match counter.checked_add(1) {
            Some(next) => next,
            // An exhausted counter is just part of the name.
            None => {
                base = name;
                1
            }
        };
        let candidate = format!("{base} #{counter}");
        if !is_taken(&candidate) {
            return candidate;
        }
    }
}

fn split_counter(name: &str) -> (&str, u64) {
    if let Some(pos) = name.rfind('#') {
        let digits = &name[pos + 1..];
        if let Ok(value) = digits.parse::<u64>() {
            if value.to_string() == digits {
                let base = &name[..pos];
                let base = base.strip_suffix(' ').unwrap_or(base);
                return (base, value);
            }
        }
    }
    (name, 0)
}

/// File stem that is safe to create in a data folder.
pub fn safe_file_stem(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return "unnamed".to_string();
    }

    let mut stem: String = trimmed
        .chars()
        .map(|c| if UNSAFE_FILENAME_CHARS.contains(&c) { '-' } else { c })
        .collect();
    if stem.starts_with('.') {
        stem.replace_range(0..1, "-");
    }
    stem
}

/// Tags derived from the folders a data file was found in.
///
/// `top` is the search-path root the walk descended from, or `None` when the
/// file sits directly in a root. Every folder between the file and `top` is a
/// tag, and so is the root itself unless its name only names the data kind.
pub fn folder_tags(dir: &Path, top: Option<&Path>) -> Vec<String> {
    let mut tags = Vec::new();
    let mut current = dir;

    if let Some(top) = top.filter(|top| dir.starts_with(top)) {
        while current != top {
            if let Some(name) = current.file_name() {
                push_tag(&mut tags, &name.to_string_lossy());
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
    }

    if let Some(name) = current.file_name() {
        let name = name.to_string_lossy();
        if !KIND_FOLDER_NAMES.contains(&name.as_ref()) {
            push_tag(&mut tags, &name);
        }
    }
    tags
}

/// Name of the first folder below `top` on the way to `dir`.
pub fn top_level_folder(dir: &Path, top: Option<&Path>) -> Option<String> {
    let relative = dir.strip_prefix(top?).ok()?;
    relative
        .components()
        .next()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
}

fn push_tag(tags: &mut Vec<String>, tag: &str) {
    if !tags.iter().any(|existing| existing == tag) {
        tags.push(tag.to_string());
    }
}
