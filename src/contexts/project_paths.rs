use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

fn module_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([\w-]+)/").expect("valid regex"))
}

/// `app/src/main/kotlin/Foo.kt` -> `app/src/test/kotlin/FooTest.kt`.
pub fn infer_test_path(service_path: &str) -> String {
    let path = service_path.replacen("/main/", "/test/", 1);
    let (dir, file) = match path.rfind('/') {
        Some(idx) => path.split_at(idx + 1),
        None => ("", path.as_str()),
    };
    match file.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}Test{}", dir, &file[..dot], &file[dot..]),
        _ => format!("{}{}Test", dir, file),
    }
}

/// First path segment of a project-relative path, else `default`.
pub fn module_of<'a>(target: &'a str, default: &'a str) -> &'a str {
    module_re()
        .captures(target)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(default)
}

pub fn test_class_name(target: &str) -> String {
    Path::new(target)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_sources_map_to_test_sources() {
        assert_eq!(
            infer_test_path("order/src/main/kotlin/com/acme/OrderService.kt"),
            "order/src/test/kotlin/com/acme/OrderServiceTest.kt"
        );
    }

    #[test]
    fn extension_is_kept_and_dotless_file_gets_suffix() {
        assert_eq!(infer_test_path("src/Foo.java"), "src/FooTest.java");
        assert_eq!(infer_test_path("Foo"), "FooTest");
    }

    #[test]
    fn module_is_first_segment() {
        assert_eq!(module_of("order-api/src/test/kotlin/A.kt", "app"), "order-api");
        assert_eq!(module_of("ATest.kt", "app"), "app");
    }

    #[test]
    fn class_name_is_file_stem() {
        assert_eq!(test_class_name("app/src/test/kotlin/FooServiceTest.kt"), "FooServiceTest");
    }
}
