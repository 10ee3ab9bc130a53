//! Classification of workspace files: housekeeping artifacts to skip, and
//! sources the application server can compile.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Base-name patterns for editor, build and version-control artifacts.
/// Matched case-insensitively, in order.
const IGNORE_PATTERNS: &[&str] = &[
    r"(.*)?(\.vscode)$",
    r"(.+)(\.erx_)$",
    r"(.+)(\.ppx_)$",
    r"(.+)(\.err)$",
    r"(.*)?(#.*#)$",
    r"(.*)?(\.#*)$",
    r"(.*)?(%.*%)$",
    r"(.*)?(\._.*)$",
    r"(.*)?(CVS)$",
    r"(.*)?(\.cvsignore)$",
    r"(.*)?(SCCS)$",
    r"(.*)?.*/SCCS/.*$",
    r"(.*)?(vssver\.scc)$",
    r"(.*)?(\.svn)$",
    r"(.*)?(\.DS_Store)$",
    r"(.*)?(\.git)$",
    r"(.*)?(\.gitattributes)$",
    r"(.*)?(\.gitignore)$",
    r"(.*)?(\.gitmodules)$",
    r"(.*)?(\.hg)$",
    r"(.*)?(\.hgignore)$",
    r"(.*)?(\.hgsub)$",
    r"(.*)?(\.hgsubstate)$",
    r"(.*)?(\.hgtags)$",
    r"(.*)?(\.bzr)$",
    r"(.*)?(\.bzrignore)$",
];

static IGNORE_LIST: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    IGNORE_PATTERNS
        .iter()
        .map(|pattern| Regex::new(&format!("(?i){}", pattern)).expect("valid ignore pattern"))
        .collect()
});

const ADVPL_EXTENSIONS: &[&str] = &[
    "ch", "prw", "prg", "prx", "ppx", "ppp", "tlpp", "aph", "ahu", "apl", "apw",
];

const LOGIX_EXTENSIONS: &[&str] = &["4gl", "per"];

fn base_name(file: &str) -> &str {
    Path::new(file)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(file)
}

/// True when the base name of `file` is a housekeeping artifact.
pub fn is_ignore_resource(file: &str) -> bool {
    let name = base_name(file);
    IGNORE_LIST.iter().any(|pattern| pattern.is_match(name))
}

fn extension_in(file: &str, extensions: &[&str]) -> bool {
    Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.contains(&ext.to_lowercase().as_str()))
}

pub fn is_advpl_source(file: &str) -> bool {
    extension_in(file, ADVPL_EXTENSIONS)
}

pub fn is_4gl_source(file: &str) -> bool {
    extension_in(file, LOGIX_EXTENSIONS)
}

/// Anything that is not a source file is sent as a resource.
pub fn is_resource(file: &str) -> bool {
    !is_advpl_source(file) && !is_4gl_source(file)
}
