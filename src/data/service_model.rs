use serde::{Deserialize, Serialize};

/// Normalized view of a service class: the input of test synthesis.
///
/// `methods` and `dependencies` keep source order so repeated runs over the
/// same input render byte-identical artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceModel {
    pub package_name: String,
    pub class_name: String,
    pub imports: Vec<String>,
    pub dependencies: Vec<Dependency>,
    pub methods: Vec<Method>,
}

/// Constructor-injected collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Fully-qualified import resolved by suffix match against the imports.
    #[serde(default)]
    pub import_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Method {
    pub name: String,
    pub return_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl Dependency {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            import_path: None,
        }
    }
}

impl ServiceModel {
    /// Methods that get generated test cases, in encounter order.
    pub fn testable_methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter().filter(|m| !m.is_private)
    }

    /// Two cases (success + error) per testable method.
    pub fn expected_test_case_count(&self) -> usize {
        self.testable_methods().count() * 2
    }

    /// `FooService` -> `fooService`. Only the first character changes.
    pub fn instance_name(&self) -> String {
        let mut chars = self.class_name.chars();
        match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn dependency_import_paths(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .iter()
            .filter_map(|d| d.import_path.as_deref())
    }
}

/// Fills `import_path` for every dependency whose type is the last segment of
/// one of the imports. The first matching import wins.
pub fn resolve_import_paths(dependencies: &mut [Dependency], imports: &[String]) {
    for dep in dependencies.iter_mut() {
        let suffix = format!(".{}", dep.type_name);
        dep.import_path = imports.iter().find(|imp| imp.ends_with(&suffix)).cloned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, is_private: bool) -> Method {
        Method {
            name: name.to_string(),
            return_type: "Long".to_string(),
            parameters: None,
            is_private,
        }
    }

    #[test]
    fn instance_name_lowercases_only_first_char() {
        let model = ServiceModel {
            class_name: "FOOService".to_string(),
            ..Default::default()
        };
        assert_eq!(model.instance_name(), "fOOService");
        assert_eq!(ServiceModel::default().instance_name(), "");
    }

    #[test]
    fn private_methods_are_not_testable() {
        let model = ServiceModel {
            methods: vec![method("getX", false), method("_helper", true), method("getY", false)],
            ..Default::default()
        };
        let names: Vec<&str> = model.testable_methods().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["getX", "getY"]);
        assert_eq!(model.expected_test_case_count(), 4);
    }

    #[test]
    fn import_paths_resolve_by_type_suffix() {
        let imports = vec![
            "com.acme.repo.BarRepoImpl".to_string(),
            "com.acme.repo.BarRepo".to_string(),
            "com.acme.client.BazClient".to_string(),
        ];
        let mut deps = vec![Dependency::new("bar", "BarRepo"), Dependency::new("qux", "Qux")];
        resolve_import_paths(&mut deps, &imports);
        assert_eq!(deps[0].import_path.as_deref(), Some("com.acme.repo.BarRepo"));
        assert_eq!(deps[1].import_path, None);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let mut dep = Dependency::new("bar", "BarRepo");
        dep.import_path = Some("com.acme.BarRepo".to_string());
        let json = serde_json::to_value(&dep).unwrap();
        assert_eq!(json["type"], "BarRepo");
        assert_eq!(json["importPath"], "com.acme.BarRepo");

        let json = serde_json::to_value(method("getX", false)).unwrap();
        assert_eq!(json["returnType"], "Long");
        assert_eq!(json["isPrivate"], false);
        assert!(json.get("parameters").is_none());
    }
}
