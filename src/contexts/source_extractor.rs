//! Service model extraction.
//!
//! Two entry points produce the same [`ServiceModel`]: a symbol overview from
//! an external analysis service, or best-effort pattern matching over raw
//! Kotlin source. Neither fails on odd input; unmatched parts come back empty.

use anyhow::{Context, Result};
use indexmap::IndexSet;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::data::{
    resolve_import_paths, Dependency, Method, Parameter, ServiceModel, SymbolKind, SymbolTree,
};

const DEFAULT_PARAM_NAME: &str = "param";
const DEFAULT_DEPENDENCY_NAME: &str = "dependency";
const DEFAULT_TYPE: &str = "Any";
const DEFAULT_RETURN_TYPE: &str = "Unit";

/// Where a model came from, reported back in the analysis step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    SymbolTree,
    SourcePatterns,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub model: ServiceModel,
    pub source: ModelSource,
}

#[derive(Debug, Clone)]
pub struct SourceModelExtractor {
    default_package: String,
}

impl SourceModelExtractor {
    pub fn new(default_package: impl Into<String>) -> Self {
        Self {
            default_package: default_package.into(),
        }
    }

    /// Reads `service_path` under `project_root` and builds its model, preferring
    /// the symbol tree when one is supplied.
    ///
    /// The source file is read in both cases: the symbol tree carries no imports.
    pub async fn extract(
        &self,
        project_root: &Path,
        service_path: &str,
        symbols: Option<&SymbolTree>,
    ) -> Result<Extraction> {
        let absolute = project_root.join(service_path);
        let source = tokio::fs::read_to_string(&absolute)
            .await
            .with_context(|| format!("Failed to read service file {}", absolute.display()))?;

        Ok(match symbols {
            Some(tree) => Extraction {
                model: self.model_from_symbols(tree, service_path, &source),
                source: ModelSource::SymbolTree,
            },
            None => Extraction {
                model: model_from_source(&source),
                source: ModelSource::SourcePatterns,
            },
        })
    }

    pub fn model_from_symbols(&self, tree: &SymbolTree, service_path: &str, source: &str) -> ServiceModel {
        let package_name =
            package_from_path(service_path).unwrap_or_else(|| self.default_package.clone());
        let class_name = tree
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| file_stem(service_path));
        let imports = extract_imports(source);

        let mut methods = Vec::new();
        let mut dependencies = Vec::new();
        for child in &tree.children {
            match child.kind() {
                SymbolKind::Method => methods.push(Method {
                    name: child.name.clone(),
                    return_type: return_type_of(child.detail()),
                    parameters: Some(parse_parameters(child.detail(), DEFAULT_PARAM_NAME)),
                    is_private: child.name.starts_with('_'),
                }),
                SymbolKind::Constructor => {
                    dependencies.extend(
                        parse_parameters(child.detail(), DEFAULT_DEPENDENCY_NAME)
                            .into_iter()
                            .map(|p| Dependency::new(strip_binding_keyword(&p.name), p.type_name)),
                    );
                }
                SymbolKind::Other => {}
            }
        }

        resolve_import_paths(&mut dependencies, &imports);
        ServiceModel {
            package_name,
            class_name,
            imports,
            dependencies,
            methods,
        }
    }
}

/// Pattern-based fallback. Every method is reported as public because the
/// patterns do not look at visibility modifiers.
pub fn model_from_source(code: &str) -> ServiceModel {
    let package_name = package_re()
        .captures(code)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let class_match = class_re().captures(code);
    let class_name = class_match
        .as_ref()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let imports = extract_imports(code);

    let mut dependencies = match class_match.and_then(|c| c.get(0)) {
        Some(m) => constructor_dependencies(&code[m.end()..]),
        None => Vec::new(),
    };
    resolve_import_paths(&mut dependencies, &imports);

    ServiceModel {
        package_name,
        class_name,
        imports,
        dependencies,
        methods: fallback_methods(code),
    }
}

/// One entry per `import a.b.C` line, first occurrence wins.
pub fn extract_imports(code: &str) -> Vec<String> {
    let mut seen = IndexSet::new();
    for line in code.lines() {
        if let Some(cap) = import_re().captures(line) {
            seen.insert(cap[1].to_string());
        }
    }
    seen.into_iter().collect()
}

fn constructor_dependencies(after_class_name: &str) -> Vec<Dependency> {
    let Some(params) = primary_constructor_params(after_class_name) else {
        return Vec::new();
    };
    split_top_level(params)
        .into_iter()
        .filter_map(|part| {
            let cap = property_param_re().captures(part.trim())?;
            let type_name = strip_default_value(&cap[3]);
            if type_name.is_empty() {
                return None;
            }
            Some(Dependency::new(&cap[2], type_name))
        })
        .collect()
}

/// Locates the parameter list of a primary constructor: the parenthesised
/// group right after the class name, optionally preceded by type parameters,
/// annotations, a visibility modifier and the `constructor` keyword.
fn primary_constructor_params(after_class_name: &str) -> Option<&str> {
    let mut rest = after_class_name.trim_start();
    if rest.starts_with('<') {
        let end = balanced_end(rest, '<', '>')?;
        rest = rest[end + 1..].trim_start();
    }
    while let Some(m) = constructor_prefix_re().find(rest) {
        let is_annotation = m.as_str().starts_with('@');
        rest = rest[m.end()..].trim_start();
        if is_annotation && rest.starts_with('(') {
            let end = balanced_end(rest, '(', ')')?;
            rest = rest[end + 1..].trim_start();
        }
    }
    if !rest.starts_with('(') {
        return None;
    }
    let end = balanced_end(rest, '(', ')')?;
    Some(&rest[1..end])
}

fn fallback_methods(code: &str) -> Vec<Method> {
    let mut methods = Vec::new();
    for cap in fun_re().captures_iter(code) {
        let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        // The match ends on the opening parenthesis.
        let open = whole.end() - 1;
        let Some(close) = balanced_end(&code[open..], '(', ')').map(|i| open + i) else {
            continue;
        };
        let Some(return_type) = declared_return_type(&code[close + 1..]) else {
            continue;
        };
        methods.push(Method {
            name: name.as_str().to_string(),
            return_type,
            parameters: Some(parameters_from_list(&code[open + 1..close], DEFAULT_PARAM_NAME)),
            is_private: false,
        });
    }
    methods
}

/// Reads `: Type` directly after a parameter list. `None` when the function
/// has no declared return type.
fn declared_return_type(after_params: &str) -> Option<String> {
    let rest = after_params.trim_start().strip_prefix(':')?;
    let mut depth = 0i32;
    let mut end = rest.len();
    for (i, c) in rest.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            '{' | '=' | '\n' if depth <= 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    let ty = rest[..end].trim();
    let ty = match ty.find(" where ") {
        Some(idx) => ty[..idx].trim_end(),
        None => ty,
    };
    (!ty.is_empty()).then(|| ty.to_string())
}

/// Return type of a symbol detail such as `(id: Long): Order`.
fn return_type_of(detail: &str) -> String {
    let detail = detail.trim();
    if detail.is_empty() {
        return DEFAULT_RETURN_TYPE.to_string();
    }
    match detail.find('(') {
        Some(open) => match balanced_end(&detail[open..], '(', ')') {
            Some(close) => declared_return_type(&detail[open + close + 1..])
                .unwrap_or_else(|| DEFAULT_RETURN_TYPE.to_string()),
            None => DEFAULT_RETURN_TYPE.to_string(),
        },
        None => detail.to_string(),
    }
}

/// Parameters of the first parenthesised group in a signature detail.
fn parse_parameters(detail: &str, default_name: &str) -> Vec<Parameter> {
    let Some(open) = detail.find('(') else {
        return Vec::new();
    };
    let Some(close) = balanced_end(&detail[open..], '(', ')') else {
        return Vec::new();
    };
    parameters_from_list(&detail[open + 1..open + close], default_name)
}

fn parameters_from_list(list: &str, default_name: &str) -> Vec<Parameter> {
    if list.trim().is_empty() {
        return Vec::new();
    }
    split_top_level(list)
        .into_iter()
        .map(|param| {
            let (name, type_name) = match param.split_once(':') {
                Some((name, ty)) => (name.trim(), strip_default_value(ty)),
                None => (param.trim(), String::new()),
            };
            Parameter {
                name: (if name.is_empty() { default_name } else { name }).to_string(),
                type_name: if type_name.is_empty() {
                    DEFAULT_TYPE.to_string()
                } else {
                    type_name
                },
            }
        })
        .collect()
}

/// Splits on commas that are not nested inside `<>`, `()` or `[]`.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            // `->` in function types is not a closing bracket.
            '>' if i > 0 && list.as_bytes()[i - 1] == b'-' => {}
            '>' | ')' | ']' => depth -= 1,
            ',' if depth <= 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect()
}

/// Index of the bracket closing the one at position 0.
fn balanced_end(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            if close == '>' && i > 0 && s.as_bytes()[i - 1] == b'-' {
                continue;
            }
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn strip_default_value(ty: &str) -> String {
    let ty = match ty.find('=') {
        Some(idx) => &ty[..idx],
        None => ty,
    };
    ty.trim().to_string()
}

fn strip_binding_keyword(name: &str) -> String {
    binding_keyword_re().replace(name.trim(), "").trim().to_string()
}

fn package_from_path(service_path: &str) -> Option<String> {
    path_package_re()
        .captures(service_path)
        .map(|c| c[1].replace('/', "."))
}

fn file_stem(service_path: &str) -> String {
    Path::new(service_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn package_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"package\s+([\w.]+)").expect("valid regex"))
}

fn class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"class\s+(\w+)").expect("valid regex"))
}

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"import\s+([\w.]+)").expect("valid regex"))
}

fn constructor_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:@[\w.]+|private|protected|internal|public|constructor)\b")
            .expect("valid regex")
    })
}

fn property_param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)(?:^|\s)(val|var)\s+(\w+)\s*:\s*(.+)$").expect("valid regex")
    })
}

fn fun_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:override\s+)?\bfun\s+(?:<[^>]*>\s*)?(\w+)\s*\(").expect("valid regex")
    })
}

fn binding_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(?:private|protected|internal|public)\s+)?(?:val|var)\s+")
            .expect("valid regex")
    })
}

fn path_package_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"kotlin/(.+)/").expect("valid regex"))
}
